//! Signed one-shot flash messages
//!
//! The cookie value is `<category>|<message>|<tag>` with the message
//! percent-encoded. The tag is a hex HMAC-SHA256 over `<category>|<message>`
//! keyed with the server secret; cookies with a bad tag are ignored.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const FLASH_COOKIE: &str = "flash";

/// Seconds a flash survives if the page is never loaded
const FLASH_MAX_AGE: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashCategory {
    Danger,
    Warning,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashCategory::Danger => "danger",
            FlashCategory::Warning => "warning",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "danger" => Some(FlashCategory::Danger),
            "warning" => Some(FlashCategory::Warning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Danger, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Warning, message)
    }

    /// `Set-Cookie` header value carrying this message
    pub fn to_set_cookie(&self, secret: &str) -> Option<String> {
        let tag = hex::encode(sign(secret, self.category, &self.message)?);
        Some(format!(
            "{}={}|{}|{}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            FLASH_COOKIE,
            self.category.as_str(),
            urlencoding::encode(&self.message),
            tag,
            FLASH_MAX_AGE
        ))
    }

    /// Decode and verify a cookie value
    pub fn from_cookie_value(value: &str, secret: &str) -> Option<Self> {
        let mut parts = value.splitn(3, '|');
        let category = FlashCategory::parse(parts.next()?)?;
        let message = urlencoding::decode(parts.next()?).ok()?.into_owned();
        let tag = hex::decode(parts.next()?).ok()?;

        let expected = sign(secret, category, &message)?;
        if expected.ct_eq(&tag).unwrap_u8() == 0 {
            tracing::debug!("Ignoring flash cookie with invalid tag");
            return None;
        }

        Some(Self { category, message })
    }

    /// Find and verify the flash cookie in a `Cookie` request header
    pub fn from_cookie_header(header: &str, secret: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == FLASH_COOKIE)
            .and_then(|(_, value)| Self::from_cookie_value(value, secret))
    }
}

/// `Set-Cookie` header value that expires the flash cookie
pub fn clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", FLASH_COOKIE)
}

fn sign(secret: &str, category: FlashCategory, message: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(category.as_str().as_bytes());
    mac.update(b"|");
    mac.update(message.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "test-secret";

    fn cookie_value(set_cookie: &str) -> &str {
        let pair = set_cookie.split(';').next().unwrap();
        pair.split_once('=').unwrap().1
    }

    #[test]
    fn test_signed_flash_is_accepted() {
        let flash = Flash::danger("An unexpected error occurred; try again | later.");
        let set_cookie = flash.to_set_cookie(SECRET).unwrap();

        assert!(set_cookie.starts_with("flash=danger|"));
        assert!(set_cookie.contains("HttpOnly"));

        let decoded = Flash::from_cookie_value(cookie_value(&set_cookie), SECRET).unwrap();
        assert_eq!(decoded, flash);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let set_cookie = Flash::danger("hello").to_set_cookie(SECRET).unwrap();
        assert!(Flash::from_cookie_value(cookie_value(&set_cookie), "other").is_none());
    }

    #[test]
    fn test_tampered_message_is_rejected() {
        let set_cookie = Flash::danger("hello").to_set_cookie(SECRET).unwrap();
        let tampered = cookie_value(&set_cookie).replacen("hello", "howdy", 1);
        assert!(Flash::from_cookie_value(&tampered, SECRET).is_none());
    }

    #[test]
    fn test_cookie_header_lookup() {
        let set_cookie = Flash::danger("hello").to_set_cookie(SECRET).unwrap();
        let header = format!("theme=dark; flash={}; other=1", cookie_value(&set_cookie));

        let flash = Flash::from_cookie_header(&header, SECRET).unwrap();
        assert_eq!(flash.message, "hello");
        assert!(Flash::from_cookie_header("theme=dark", SECRET).is_none());
    }

    #[test]
    fn test_tag_is_hmac_sha256() {
        let set_cookie = Flash::warning("hello").to_set_cookie(SECRET).unwrap();
        let tag = cookie_value(&set_cookie).rsplit('|').next().unwrap();

        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(b"warning|hello");
        assert_eq!(tag, hex::encode(mac.finalize().into_bytes()));
    }

    #[test]
    fn test_truncated_or_non_hex_tag_is_rejected() {
        let set_cookie = Flash::danger("hello").to_set_cookie(SECRET).unwrap();
        let value = cookie_value(&set_cookie);

        assert!(Flash::from_cookie_value(&value[..value.len() - 2], SECRET).is_none());
        assert!(Flash::from_cookie_value("danger|hello|zz", SECRET).is_none());
        assert!(Flash::from_cookie_value("danger|hello|", SECRET).is_none());
    }

    #[test]
    fn test_clear_cookie_expires() {
        assert!(clear_cookie().starts_with("flash=;"));
        assert!(clear_cookie().contains("Max-Age=0"));
    }
}
