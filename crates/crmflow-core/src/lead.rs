// Lead domain type
//
// A lead is the prospect a workflow instance runs against. Executors read its
// contact channels and may update status, tags and custom fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// CRM lead (prospect)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Lead {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form fields (loyalty points, birthday, ...)
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub custom_fields: Value,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Create a NEW lead with no contact channels
    pub fn new(user_id: Uuid, business_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            business_name: business_name.into(),
            contact_person: None,
            email: None,
            phone: None,
            status: "NEW".to_string(),
            tags: vec![],
            custom_fields: json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn with_contact(mut self, contact_person: impl Into<String>) -> Self {
        self.contact_person = Some(contact_person.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Name used when addressing the lead: contact person, then business name
    pub fn display_name(&self) -> &str {
        self.contact_person
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.business_name)
    }

    pub fn first_name(&self) -> &str {
        self.display_name().split_whitespace().next().unwrap_or("")
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn has_tag(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }

    /// Read a numeric custom field, defaulting to 0
    pub fn custom_i64(&self, key: &str) -> i64 {
        self.custom_fields
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Set a custom field, turning a non-object value into an object first
    pub fn set_custom(&mut self, key: &str, value: Value) {
        if !self.custom_fields.is_object() {
            self.custom_fields = Value::Object(Map::new());
        }
        if let Some(map) = self.custom_fields.as_object_mut() {
            map.insert(key.to_string(), value);
        }
    }

    /// JSON view used for branch condition evaluation
    pub fn to_context(&self) -> Value {
        json!({
            "id": self.id,
            "businessName": self.business_name,
            "contactPerson": self.contact_person,
            "email": self.email,
            "phone": self.phone,
            "status": self.status,
            "tags": self.tags,
            "customFields": self.custom_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_contact_person() {
        let lead = Lead::new(Uuid::now_v7(), "Acme Corp").with_contact("Jane Doe");
        assert_eq!(lead.display_name(), "Jane Doe");
        assert_eq!(lead.first_name(), "Jane");

        let lead = Lead::new(Uuid::now_v7(), "Acme Corp").with_contact("  ");
        assert_eq!(lead.display_name(), "Acme Corp");
    }

    #[test]
    fn test_blank_contact_channels_are_absent() {
        let lead = Lead::new(Uuid::now_v7(), "Acme").with_email("").with_phone(" ");
        assert!(lead.email().is_none());
        assert!(lead.phone().is_none());
    }

    #[test]
    fn test_has_tag_is_case_insensitive_substring() {
        let lead = Lead::new(Uuid::now_v7(), "Acme").with_tags(&["Home-Seller", "vip"]);
        assert!(lead.has_tag("seller"));
        assert!(!lead.has_tag("listing"));
    }

    #[test]
    fn test_custom_fields() {
        let mut lead = Lead::new(Uuid::now_v7(), "Acme");
        assert_eq!(lead.custom_i64("loyaltyPoints"), 0);
        lead.set_custom("loyaltyPoints", json!(150));
        assert_eq!(lead.custom_i64("loyaltyPoints"), 150);

        lead.custom_fields = Value::Null;
        lead.set_custom("birthday", json!("1990-01-01"));
        assert_eq!(lead.custom_fields["birthday"], "1990-01-01");
    }
}
