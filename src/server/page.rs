//! Input page generated from the field mapping table

use super::flash::Flash;
use crate::form::{FieldKind, FieldSpec, FormSchema};
use crate::pipeline::{API_KEY_INPUT, LLM_TOGGLE_INPUT};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
fieldset { border: 1px solid #ccc; border-radius: 4px; margin-bottom: 1.25rem; padding: 0.75rem 1rem; }
legend { font-weight: 600; }
label { display: block; margin: 0.5rem 0 0.2rem; }
label.check { display: flex; gap: 0.5rem; align-items: center; }
input[type=text], input[type=password], input[type=date], select { width: 100%; padding: 0.35rem; box-sizing: border-box; }
.radio-group { margin: 0.5rem 0; }
.children td { padding: 0.2rem 0.4rem 0.2rem 0; }
.alert { padding: 0.75rem 1rem; border-radius: 4px; margin-bottom: 1rem; }
.alert-danger { background: #f8d7da; color: #721c24; }
.alert-warning { background: #fff3cd; color: #856404; }
button { padding: 0.45rem 1rem; }
"#;

const CHILDREN_SCRIPT: &str = r#"
(function () {
  var table = document.getElementById('children-rows');
  var add = document.getElementById('add-child');
  var max = parseInt(table.getAttribute('data-max'), 10);
  add.addEventListener('click', function () {
    var rows = table.querySelectorAll('tr.child-row');
    if (rows.length >= max) { return; }
    var row = rows[0].cloneNode(true);
    row.querySelectorAll('input').forEach(function (input) { input.value = ''; });
    table.appendChild(row);
    if (rows.length + 1 >= max) { add.disabled = true; }
  });
})();
"#;

/// Render the complete input page
pub fn render(schema: &FormSchema, flash: Option<&Flash>) -> String {
    let mut html = String::with_capacity(16 * 1024);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Request for Order (FL-300)</title>\n<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<h1>Request for Order (FL-300)</h1>\n");

    if let Some(flash) = flash {
        let _ = writeln!(
            html,
            "<div class=\"alert alert-{}\" role=\"alert\">{}</div>",
            flash.category.as_str(),
            text(&flash.message)
        );
    }

    html.push_str("<form method=\"post\" action=\"/fill_form\">\n");

    for (section, fields) in sections(schema) {
        let _ = writeln!(html, "<fieldset>\n<legend>{}</legend>", text(section));
        for field in fields {
            render_field(&mut html, field);
        }
        html.push_str("</fieldset>\n");
    }

    if let Some(group) = schema.children() {
        let _ = write!(
            html,
            "<fieldset class=\"children\">\n<legend>Children</legend>\n\
             <table id=\"children-rows\" data-max=\"{slots}\">\n\
             <tr><th>Name</th><th>Date of birth</th></tr>\n\
             <tr class=\"child-row\">\
             <td><input type=\"text\" name=\"{name}[]\" aria-label=\"Child name\"></td>\
             <td><input type=\"text\" name=\"{dob}[]\" aria-label=\"Child date of birth\"></td>\
             </tr>\n</table>\n\
             <button type=\"button\" id=\"add-child\">Add child</button>\n</fieldset>\n",
            slots = group.slots,
            name = attr(&group.name_key),
            dob = attr(&group.dob_key),
        );
    }

    let _ = write!(
        html,
        "<fieldset>\n<legend>Auto-complete</legend>\n\
         <label class=\"check\"><input type=\"checkbox\" name=\"{toggle}\" value=\"on\"> \
         Fill in missing fields with an LLM</label>\n\
         <label for=\"{key}\">OpenAI API key</label>\n\
         <input type=\"password\" id=\"{key}\" name=\"{key}\" autocomplete=\"off\">\n\
         </fieldset>\n",
        toggle = LLM_TOGGLE_INPUT,
        key = API_KEY_INPUT,
    );

    html.push_str("<button type=\"submit\">Generate PDF</button>\n</form>\n");

    if schema.children().is_some() {
        html.push_str("<script>");
        html.push_str(CHILDREN_SCRIPT);
        html.push_str("</script>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Schema fields grouped by section in first-seen order, child slots excluded
fn sections(schema: &FormSchema) -> Vec<(&str, Vec<&FieldSpec>)> {
    let mut groups: Vec<(&str, Vec<&FieldSpec>)> = Vec::new();

    for field in schema.fields() {
        if schema.is_child_slot(&field.external_name) {
            continue;
        }
        let section = if field.section.is_empty() {
            "Form"
        } else {
            field.section.as_str()
        };
        match groups.iter_mut().find(|(name, _)| *name == section) {
            Some((_, fields)) => fields.push(field),
            None => groups.push((section, vec![field])),
        }
    }

    groups
}

fn render_field(html: &mut String, field: &FieldSpec) {
    let name = attr(&field.external_name);
    let label = if field.label.is_empty() {
        field.external_name.as_str()
    } else {
        field.label.as_str()
    };

    let _ = match field.kind {
        FieldKind::Checkbox => writeln!(
            html,
            "<label class=\"check\"><input type=\"checkbox\" name=\"{name}\" value=\"on\"> {label}</label>",
            name = name,
            label = text(label),
        ),
        FieldKind::Date => writeln!(
            html,
            "<label for=\"f-{name}\">{label}</label>\n\
             <input type=\"date\" id=\"f-{name}\" name=\"{name}\">",
            name = name,
            label = text(label),
        ),
        FieldKind::Radio if !field.options.is_empty() => {
            let _ = writeln!(html, "<div class=\"radio-group\">{}", text(label));
            for option in &field.options {
                let _ = writeln!(
                    html,
                    "<label class=\"check\"><input type=\"radio\" name=\"{name}\" value=\"{value}\"> {option}</label>",
                    name = name,
                    value = attr(option),
                    option = text(option),
                );
            }
            writeln!(html, "</div>")
        }
        FieldKind::Choice if !field.options.is_empty() => {
            let _ = writeln!(
                html,
                "<label for=\"f-{name}\">{label}</label>\n<select id=\"f-{name}\" name=\"{name}\">\n<option value=\"\"></option>",
                name = name,
                label = text(label),
            );
            for option in &field.options {
                let _ = writeln!(
                    html,
                    "<option value=\"{value}\">{option}</option>",
                    value = attr(option),
                    option = text(option),
                );
            }
            writeln!(html, "</select>")
        }
        // Text, and option fields without a configured option list
        _ => writeln!(
            html,
            "<label for=\"f-{name}\">{label}</label>\n\
             <input type=\"text\" id=\"f-{name}\" name=\"{name}\">",
            name = name,
            label = text(label),
        ),
    };
}
