//! Customer-side records owned by the secondary backend.
//!
//! [`Customer`] is a company row in `customers`; [`CustomerUser`] is one contact at that
//! company in `customer_users`, linked to an auth identity through `auth_user_id`.
//! The `New*` structs are the insert payloads used by signup.

use serde::{Deserialize, Serialize};

/// Contact role of a customer user within their company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Finance,
    Admin,
    #[default]
    Buyer,
    Manager,
    Warehouse,
    Custom,
}

/// Company fields joined onto a customer user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub trading_name: Option<String>,
    pub linked_company: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// A contact record in `customer_users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerUser {
    pub id: String,
    #[serde(default)]
    pub auth_user_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub linked_customer: String,
    #[serde(default)]
    pub primary_contact: bool,
    #[serde(default)]
    pub contact_type: ContactType,
    pub is_active: bool,
    #[serde(default)]
    pub master_user: bool,
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default)]
    pub marketing: bool,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
}

/// A company record in `customers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub trading_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub linked_company: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl Customer {
    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            trading_name: self.trading_name.clone(),
            linked_company: self.linked_company.clone(),
            logo_url: self.logo_url.clone(),
        }
    }
}

/// Details collected by the signup form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSignupData {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub company: String,
    #[serde(default)]
    pub contact_type: ContactType,
}

/// Insert payload for a pending company record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCustomer {
    pub display_name: String,
    pub trading_name: String,
    pub linked_company: String,
    pub email: String,
    pub is_active: bool,
    pub segment: String,
    pub currency_code: String,
    pub payment_terms: u32,
    pub billing_address_1: String,
    pub billing_city_town: String,
    pub billing_county: String,
    pub billing_postcode: String,
    pub shipping_address_1: String,
    pub shipping_city_town: String,
    pub shipping_county: String,
    pub shipping_postcode: String,
}

impl NewCustomer {
    const PLACEHOLDER: &'static str = "TBD";

    /// A new company awaiting approval, with placeholder addresses.
    pub fn pending(company: &str, email: &str, linked_company: &str) -> Self {
        let tbd = || Self::PLACEHOLDER.to_string();
        Self {
            display_name: company.to_string(),
            trading_name: company.to_string(),
            linked_company: linked_company.to_string(),
            email: email.to_string(),
            is_active: false,
            segment: "New".to_string(),
            currency_code: "GBP".to_string(),
            payment_terms: 30,
            billing_address_1: tbd(),
            billing_city_town: tbd(),
            billing_county: tbd(),
            billing_postcode: tbd(),
            shipping_address_1: tbd(),
            shipping_city_town: tbd(),
            shipping_county: tbd(),
            shipping_postcode: tbd(),
        }
    }
}

/// Insert payload for a contact record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCustomerUser {
    pub auth_user_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub linked_customer: String,
    pub primary_contact: bool,
    pub contact_type: ContactType,
    pub is_active: bool,
    pub master_user: bool,
    pub location_type: String,
    pub marketing: bool,
}
