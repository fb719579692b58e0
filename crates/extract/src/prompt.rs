use std::collections::BTreeMap;

use messages::VendorType;
use serde::{Deserialize, Serialize};

pub const GENERIC_PROMPT_NAME: &str = "invoice-extraction-generic";
pub const GENERIC_PROMPT_VERSION: &str = "1";

const GENERIC_SYSTEM: &str = "You are an accounts-payable assistant. You read scanned \
invoices and return their contents as strict JSON. Never invent values: use null for \
anything that is not legible on the page.";

const GENERIC_INSTRUCTION: &str = r#"Extract the invoice shown in the attached page images.
Return a single JSON object with exactly these keys:
{
  "invoice_id": string,
  "invoice_date": string or null (YYYY-MM-DD),
  "due_date": string or null (YYYY-MM-DD),
  "vendor_name": string or null,
  "currency": string or null (ISO 4217 code),
  "subtotal": number or null,
  "tax": number or null,
  "total": number or null,
  "line_items": [
    {"description": string or null, "quantity": number or null, "unit_price": number or null, "amount": number or null}
  ]
}
Amounts are plain numbers without currency symbols or thousands separators.
If the document spans several pages, combine them into one invoice."#;

/// A named, versioned extraction prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub system: String,
    pub instruction: String,
}

impl PromptTemplate {
    pub fn generic() -> Self {
        Self {
            name: GENERIC_PROMPT_NAME.to_string(),
            version: GENERIC_PROMPT_VERSION.to_string(),
            system: GENERIC_SYSTEM.to_string(),
            instruction: GENERIC_INSTRUCTION.to_string(),
        }
    }
}

/// Vendor-specific prompts with a generic fallback.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    generic: PromptTemplate,
    vendors: BTreeMap<VendorType, PromptTemplate>,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl PromptRegistry {
    pub fn new(vendors: BTreeMap<VendorType, PromptTemplate>) -> Self {
        Self {
            generic: PromptTemplate::generic(),
            vendors,
        }
    }

    pub fn with_generic(mut self, generic: PromptTemplate) -> Self {
        self.generic = generic;
        self
    }

    pub fn for_vendor(&self, vendor: &VendorType) -> &PromptTemplate {
        self.vendors.get(vendor).unwrap_or(&self.generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_vendor_gets_generic_prompt() {
        let acme = VendorType::new("ACME").unwrap();
        let registry = PromptRegistry::new(BTreeMap::from([(
            acme.clone(),
            PromptTemplate {
                name: "invoice-extraction-acme".into(),
                version: "3".into(),
                ..PromptTemplate::generic()
            },
        )]));

        assert_eq!(registry.for_vendor(&acme).version, "3");
        let generic = registry.for_vendor(&VendorType::generic());
        assert_eq!(generic.name, GENERIC_PROMPT_NAME);
        assert_eq!(generic.version, "1");
    }
}
