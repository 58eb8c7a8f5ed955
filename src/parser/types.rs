use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Input columns accepted by the registration form, in CSV order.
pub const REGISTRATION_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "dob",
    "address",
    "city",
    "country",
    "state",
    "postcode",
    "phone",
    "email",
    "password",
];

/// Input columns accepted by the checkout flow, in CSV order.
pub const CHECKOUT_FIELDS: &[&str] = &[
    "address",
    "city",
    "state",
    "country",
    "postcode",
    "payment_method",
    "account_name",
    "account_number",
];

pub const COL_TEST_ID: &str = "testId";
pub const COL_TEST_NAME: &str = "testName";
pub const COL_PRECONDITION: &str = "precondition";
pub const COL_EXPECTED_RESULT: &str = "expectedResult";

/// UI transaction sequence a test case drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    Registration,
    Checkout,
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Registration => "registration",
            Workflow::Checkout => "checkout",
        }
    }

    /// Optional input fields of this workflow, in CSV column order
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            Workflow::Registration => REGISTRATION_FIELDS,
            Workflow::Checkout => CHECKOUT_FIELDS,
        }
    }

    pub fn empty_fields(&self) -> WorkflowFields {
        match self {
            Workflow::Registration => WorkflowFields::Registration(RegistrationFields::default()),
            Workflow::Checkout => WorkflowFields::Checkout(CheckoutFields::default()),
        }
    }

    /// Full CSV header: fixed columns around the workflow's optional fields
    pub fn csv_header(&self) -> Vec<&'static str> {
        let mut header = vec![COL_TEST_ID, COL_TEST_NAME, COL_PRECONDITION];
        header.extend_from_slice(self.field_names());
        header.push(COL_EXPECTED_RESULT);
        header
    }

    /// Guess the workflow from a test-case CSV header.
    ///
    /// Columns unique to one workflow decide; shared columns (address, city, ...)
    /// are ignored.
    pub fn detect<'a>(header: impl IntoIterator<Item = &'a str>) -> Option<Workflow> {
        let mut registration = false;
        let mut checkout = false;
        for column in header {
            let column = column.trim();
            if REGISTRATION_FIELDS.contains(&column) && !CHECKOUT_FIELDS.contains(&column) {
                registration = true;
            }
            if CHECKOUT_FIELDS.contains(&column) && !REGISTRATION_FIELDS.contains(&column) {
                checkout = true;
            }
        }
        match (registration, checkout) {
            (true, false) => Some(Workflow::Registration),
            (false, true) => Some(Workflow::Checkout),
            _ => None,
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "registration" | "register" | "customer-registration" => Ok(Workflow::Registration),
            "checkout" => Ok(Workflow::Checkout),
            other => Err(format!(
                "unknown workflow '{}' (expected registration or checkout)",
                other
            )),
        }
    }
}

/// Registration form input. `None` means "leave the control untouched".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl RegistrationFields {
    fn slot(&self, key: &str) -> Option<&Option<String>> {
        Some(match key {
            "first_name" => &self.first_name,
            "last_name" => &self.last_name,
            "dob" => &self.dob,
            "address" => &self.address,
            "city" => &self.city,
            "country" => &self.country,
            "state" => &self.state,
            "postcode" => &self.postcode,
            "phone" => &self.phone,
            "email" => &self.email,
            "password" => &self.password,
            _ => return None,
        })
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            "first_name" => &mut self.first_name,
            "last_name" => &mut self.last_name,
            "dob" => &mut self.dob,
            "address" => &mut self.address,
            "city" => &mut self.city,
            "country" => &mut self.country,
            "state" => &mut self.state,
            "postcode" => &mut self.postcode,
            "phone" => &mut self.phone,
            "email" => &mut self.email,
            "password" => &mut self.password,
            _ => return None,
        })
    }
}

/// Checkout input: billing address plus payment details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutFields {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub payment_method: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
}

impl CheckoutFields {
    fn slot(&self, key: &str) -> Option<&Option<String>> {
        Some(match key {
            "address" => &self.address,
            "city" => &self.city,
            "state" => &self.state,
            "country" => &self.country,
            "postcode" => &self.postcode,
            "payment_method" => &self.payment_method,
            "account_name" => &self.account_name,
            "account_number" => &self.account_number,
            _ => return None,
        })
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            "address" => &mut self.address,
            "city" => &mut self.city,
            "state" => &mut self.state,
            "country" => &mut self.country,
            "postcode" => &mut self.postcode,
            "payment_method" => &mut self.payment_method,
            "account_name" => &mut self.account_name,
            "account_number" => &mut self.account_number,
            _ => return None,
        })
    }
}

/// Workflow-specific optional fields of a test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowFields {
    Registration(RegistrationFields),
    Checkout(CheckoutFields),
}

impl WorkflowFields {
    pub fn workflow(&self) -> Workflow {
        match self {
            WorkflowFields::Registration(_) => Workflow::Registration,
            WorkflowFields::Checkout(_) => Workflow::Checkout,
        }
    }

    /// Look up a field by its column name.
    pub fn get(&self, key: &str) -> Option<&str> {
        let slot = match self {
            WorkflowFields::Registration(f) => f.slot(key),
            WorkflowFields::Checkout(f) => f.slot(key),
        };
        slot.and_then(|v| v.as_deref())
    }

    /// Assign a field by its column name.
    ///
    /// Returns `false` when the name is not one of this workflow's fields.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match self {
            WorkflowFields::Registration(f) => f.slot_mut(key),
            WorkflowFields::Checkout(f) => f.slot_mut(key),
        };
        match slot {
            Some(slot) => {
                *slot = Some(value.into());
                true
            }
            None => false,
        }
    }
}

/// One executable test scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseRecord {
    pub test_id: String,
    pub test_name: String,
    pub precondition: String,
    pub fields: WorkflowFields,
    pub expected_result: String,
}

impl TestCaseRecord {
    pub fn new(
        test_id: impl Into<String>,
        test_name: impl Into<String>,
        precondition: impl Into<String>,
        fields: WorkflowFields,
        expected_result: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            test_name: test_name.into(),
            precondition: precondition.into(),
            fields,
            expected_result: expected_result.into(),
        }
    }

    pub fn workflow(&self) -> Workflow {
        self.fields.workflow()
    }

    /// Name used for reporting, e.g. `CR_01: Valid registration`
    pub fn display_name(&self) -> String {
        if self.test_name.is_empty() {
            self.test_id.clone()
        } else {
            format!("{}: {}", self.test_id, self.test_name)
        }
    }

    /// Values in the order of [`Workflow::csv_header`], absent fields as "".
    pub fn to_csv_row(&self) -> Vec<&str> {
        let mut row = vec![
            self.test_id.as_str(),
            self.test_name.as_str(),
            self.precondition.as_str(),
        ];
        for name in self.workflow().field_names() {
            row.push(self.fields.get(name).unwrap_or(""));
        }
        row.push(self.expected_result.as_str());
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_rejects_foreign_fields() {
        let mut fields = Workflow::Checkout.empty_fields();
        assert!(fields.set("payment_method", "Bank Transfer"));
        assert!(!fields.set("first_name", "Jane"));
        assert_eq!(fields.get("payment_method"), Some("Bank Transfer"));
        assert_eq!(fields.get("first_name"), None);
    }

    #[test]
    fn test_csv_row_follows_header() {
        let mut fields = Workflow::Registration.empty_fields();
        fields.set("email", "jane@x.com");
        fields.set("first_name", "Jane");
        let record = TestCaseRecord::new(
            "CR_01",
            "Valid registration",
            "",
            fields,
            "Registration successful.",
        );

        let header = Workflow::Registration.csv_header();
        let row = record.to_csv_row();
        assert_eq!(header.len(), row.len());

        let email_idx = header.iter().position(|h| *h == "email").unwrap();
        assert_eq!(row[email_idx], "jane@x.com");
        assert_eq!(row[3], "Jane");
        assert_eq!(row[4], "");
        assert_eq!(*row.last().unwrap(), "Registration successful.");
    }

    #[test]
    fn test_detect_workflow() {
        let registration = Workflow::Registration.csv_header();
        let checkout = Workflow::Checkout.csv_header();
        assert_eq!(
            Workflow::detect(registration.iter().copied()),
            Some(Workflow::Registration)
        );
        assert_eq!(
            Workflow::detect(checkout.iter().copied()),
            Some(Workflow::Checkout)
        );
        assert_eq!(Workflow::detect(["testId", "address", "city"]), None);
    }

    #[test]
    fn test_workflow_from_str() {
        assert_eq!("Checkout".parse::<Workflow>(), Ok(Workflow::Checkout));
        assert_eq!("register".parse::<Workflow>(), Ok(Workflow::Registration));
        assert!("login".parse::<Workflow>().is_err());
    }
}
