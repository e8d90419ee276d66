use chrono::{SecondsFormat, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::ids::ContactId;
use crate::validation::{validate_name, validate_phone};

/// Field set of a remote document or a legacy table row.
pub type Document = serde_json::Map<String, Value>;

pub const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: String,
    /// Columns this model does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Document,
}

impl Contact {
    /// Build a contact from a remote document. Scalars in known fields are
    /// coerced to strings; everything unrecognized lands in `extra`.
    pub fn from_document(id: ContactId, mut doc: Document) -> Self {
        let name = doc.remove("name").and_then(value_to_string).unwrap_or_default();
        let created_at = doc
            .remove("created_at")
            .and_then(value_to_string)
            .unwrap_or_default();
        let mut take = |key: &str| doc.remove(key).and_then(value_to_string);
        let email = take("email");
        let phone = take("phone");
        let address = take("address");
        let city = take("city");
        let state = take("state");
        let country = take("country");
        let pincode = take("pincode");
        let avatar_url = take("avatar_url");
        doc.remove("id");

        Self {
            id,
            name,
            email,
            phone,
            address,
            city,
            state,
            country,
            pincode,
            avatar_url,
            created_at,
            extra: doc,
        }
    }

    /// Every field except the identifier, as stored in a remote document.
    pub fn to_document(&self) -> Document {
        let mut doc = self.extra.clone();
        doc.insert("name".into(), Value::String(self.name.clone()));
        for (key, value) in self.optional_fields() {
            if let Some(value) = value {
                doc.insert(key.into(), Value::String(value.clone()));
            }
        }
        doc.insert("created_at".into(), Value::String(self.created_at.clone()));
        doc
    }

    pub fn optional_fields(&self) -> [(&'static str, &Option<String>); 8] {
        [
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
            ("pincode", &self.pincode),
            ("avatar_url", &self.avatar_url),
        ]
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// User-supplied fields for a contact that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ContactDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Trim every field, drop empty optionals, fill the default avatar, and
    /// validate. The returned draft is ready to be persisted.
    pub fn normalized(self) -> Result<Self, CoreError> {
        let name = self.name.trim().to_string();
        validate_name(&name)?;
        let phone = clean(self.phone);
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }
        let avatar_url = clean(self.avatar_url).or_else(|| Some(default_avatar_url(&name)));
        Ok(Self {
            name,
            email: clean(self.email),
            phone,
            address: clean(self.address),
            city: clean(self.city),
            state: clean(self.state),
            country: clean(self.country),
            pincode: clean(self.pincode),
            avatar_url,
        })
    }

    pub fn into_contact(self, id: ContactId, created_at: String) -> Contact {
        Contact {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            country: self.country,
            pincode: self.pincode,
            avatar_url: self.avatar_url,
            created_at,
            extra: Document::new(),
        }
    }
}

/// Partial update. Each `Some` field overwrites the stored value; `None`
/// leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ContactPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.fields().iter().all(|(_, v)| v.is_none())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(name) = &self.name {
            validate_name(name.trim())?;
        }
        if let Some(phone) = self.phone.as_deref().map(str::trim)
            && !phone.is_empty()
        {
            validate_phone(phone)?;
        }
        Ok(())
    }

    pub fn apply(&self, contact: &mut Contact) {
        if let Some(name) = &self.name {
            contact.name = name.trim().to_string();
        }
        let targets = [
            (&self.email, &mut contact.email),
            (&self.phone, &mut contact.phone),
            (&self.address, &mut contact.address),
            (&self.city, &mut contact.city),
            (&self.state, &mut contact.state),
            (&self.country, &mut contact.country),
            (&self.pincode, &mut contact.pincode),
            (&self.avatar_url, &mut contact.avatar_url),
        ];
        for (update, slot) in targets {
            if let Some(value) = update {
                *slot = clean(Some(value.clone()));
            }
        }
    }

    /// Only the fields being changed, for a remote partial update. A blank
    /// value clears the field and is sent as null.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(name) = &self.name {
            doc.insert("name".into(), Value::String(name.trim().to_string()));
        }
        for (key, value) in self.fields() {
            if let Some(value) = value {
                let value = clean(Some(value.clone())).map_or(Value::Null, Value::String);
                doc.insert(key.into(), value);
            }
        }
        doc
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 8] {
        [
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
            ("pincode", &self.pincode),
            ("avatar_url", &self.avatar_url),
        ]
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Creation timestamp in the same shape JavaScript's `toISOString` produces.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bytes left unescaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn default_avatar_url(name: &str) -> String {
    format!("{AVATAR_BASE_URL}{}", encode_uri_component(name))
}

fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Split an address into display lines at commas. Every line but the last
/// keeps its trailing comma; blank segments are dropped.
pub fn format_address(address: &str) -> Vec<String> {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i == last {
                (*part).to_string()
            } else {
                format!("{part},")
            }
        })
        .collect()
}
