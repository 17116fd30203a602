// Message personalization
//
// Replaces `{{firstName}}` / `{firstName}` style placeholders in SMS and email
// templates. Placeholder names are case-insensitive; unknown placeholders are left
// untouched so a typo is visible in the delivered message rather than silently blank.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::lead::Lead;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{?\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}?\}").ok());

/// Fill placeholders from the lead, then from `extra` (keys matched case-insensitively)
pub fn personalize(template: &str, lead: &Lead, extra: &Map<String, Value>) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };

    re.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        lead_value(lead, name)
            .or_else(|| extra_value(extra, name))
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

fn lead_value(lead: &Lead, name: &str) -> Option<String> {
    let value = match name.to_lowercase().replace('_', "").as_str() {
        "firstname" => lead.first_name().to_string(),
        "name" | "contactname" | "fullname" | "contactperson" => lead.display_name().to_string(),
        "businessname" | "company" => lead.business_name.clone(),
        "email" => lead.email().unwrap_or_default().to_string(),
        "phone" => lead.phone().unwrap_or_default().to_string(),
        "status" => lead.status.clone(),
        _ => return None,
    };
    Some(value)
}

fn extra_value(extra: &Map<String, Value>, name: &str) -> Option<String> {
    extra
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn lead() -> Lead {
        Lead::new(Uuid::now_v7(), "Bella Cucina")
            .with_contact("Maria Rossi")
            .with_email("maria@example.com")
    }

    #[test]
    fn test_double_and_single_braces() {
        let out = personalize("Hi {{firstName}}, welcome to {businessName}!", &lead(), &Map::new());
        assert_eq!(out, "Hi Maria, welcome to Bella Cucina!");
    }

    #[test]
    fn test_case_insensitive_names() {
        let out = personalize("{{FIRSTNAME}} / {{ name }} / {first_name}", &lead(), &Map::new());
        assert_eq!(out, "Maria / Maria Rossi / Maria");
    }

    #[test]
    fn test_extra_values_and_unknown_placeholders() {
        let mut extra = Map::new();
        extra.insert("points".to_string(), json!(150));
        let out = personalize("You have {{Points}} points. {{coupon}}", &lead(), &extra);
        assert_eq!(out, "You have 150 points. {{coupon}}");
    }

    #[test]
    fn test_missing_phone_renders_empty() {
        let out = personalize("Call {{phone}}.", &lead(), &Map::new());
        assert_eq!(out, "Call .");
    }
}
