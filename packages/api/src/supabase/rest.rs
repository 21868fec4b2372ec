//! PostgREST table access for the role and customer directories.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use super::SupabaseClient;
use crate::backend::{CustomerDirectory, RoleDirectory};
use crate::error::BackendError;
use crate::models::{Customer, CustomerUser, NewCustomer, NewCustomerUser};

const CUSTOMER_COLUMNS: &str =
    "id,display_name,trading_name,email,linked_company,is_active,logo_url";
const JOINED_CUSTOMER: &str =
    "*,customer:customers(id,display_name,trading_name,linked_company,logo_url)";
const JOINED_CUSTOMER_INNER: &str =
    "*,customer:customers!inner(id,display_name,trading_name,linked_company,logo_url)";

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn first<T>(rows: Vec<T>, table: &str) -> Result<T, BackendError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::Decode(format!("{} insert returned no row", table)))
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

#[derive(Deserialize)]
struct LinkedCustomerRow {
    linked_customer: String,
}

#[async_trait]
impl RoleDirectory for SupabaseClient {
    async fn role_for(&self, auth_user_id: &str) -> Result<Option<String>, BackendError> {
        let request = self
            .request(Method::GET, "/rest/v1/users")
            .query(&[
                ("select", "role".to_string()),
                ("auth_user_id", eq(auth_user_id)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<RoleRow> = self.send_json(request).await?;
        Ok(rows.into_iter().next().and_then(|r| r.role))
    }
}

#[async_trait]
impl CustomerDirectory for SupabaseClient {
    async fn find_customer_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CustomerUser>, BackendError> {
        let request = self
            .request(Method::GET, "/rest/v1/customer_users")
            .query(&[
                ("select", "*".to_string()),
                ("email", eq(email)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<CustomerUser> = self.send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_customer_user_by_auth_id(
        &self,
        auth_user_id: &str,
    ) -> Result<Option<CustomerUser>, BackendError> {
        let request = self
            .request(Method::GET, "/rest/v1/customer_users")
            .query(&[
                ("select", JOINED_CUSTOMER.to_string()),
                ("auth_user_id", eq(auth_user_id)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<CustomerUser> = self.send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_customer_by_email(
        &self,
        email: &str,
        linked_company: &str,
    ) -> Result<Option<Customer>, BackendError> {
        let request = self
            .request(Method::GET, "/rest/v1/customers")
            .query(&[
                ("select", CUSTOMER_COLUMNS.to_string()),
                ("email", eq(email)),
                ("linked_company", eq(linked_company)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<Customer> = self.send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_customer(&self, customer: &NewCustomer) -> Result<Customer, BackendError> {
        let request = self
            .request(Method::POST, "/rest/v1/customers")
            .query(&[("select", CUSTOMER_COLUMNS)])
            .header("Prefer", "return=representation")
            .json(&[customer]);
        first(self.send_json(request).await?, "customers")
    }

    async fn insert_customer_user(
        &self,
        user: &NewCustomerUser,
    ) -> Result<CustomerUser, BackendError> {
        let request = self
            .request(Method::POST, "/rest/v1/customer_users")
            .header("Prefer", "return=representation")
            .json(&[user]);
        first(self.send_json(request).await?, "customer_users")
    }

    async fn record_login(&self, customer_user_id: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, "/rest/v1/customer_users")
            .query(&[("id", eq(customer_user_id))])
            .json(&serde_json::json!({
                "last_login": chrono::Utc::now().to_rfc3339(),
                "is_online": true,
            }));
        self.send_empty(request).await
    }

    async fn set_online(&self, auth_user_id: &str, online: bool) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, "/rest/v1/customer_users")
            .query(&[("auth_user_id", eq(auth_user_id))])
            .json(&serde_json::json!({ "is_online": online }));
        self.send_empty(request).await
    }

    async fn list_customer_users(
        &self,
        linked_company: &str,
    ) -> Result<Vec<CustomerUser>, BackendError> {
        let request = self
            .request(Method::GET, "/rest/v1/customer_users")
            .query(&[
                ("select", JOINED_CUSTOMER_INNER.to_string()),
                ("customer.linked_company", eq(linked_company)),
                ("order", "created_date.desc".to_string()),
            ]);
        self.send_json(request).await
    }

    async fn set_customer_user_active(
        &self,
        customer_user_id: &str,
        active: bool,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::PATCH, "/rest/v1/customer_users")
            .query(&[
                ("id", eq(customer_user_id)),
                ("select", "linked_customer".to_string()),
            ])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({
                "is_active": active,
                "last_modified": chrono::Utc::now().to_rfc3339(),
            }));
        let rows: Vec<LinkedCustomerRow> = self.send_json(request).await?;
        let Some(row) = rows.into_iter().next() else {
            return Err(BackendError::Status {
                status: 404,
                message: format!("customer user {} not found", customer_user_id),
            });
        };

        let request = self
            .request(Method::PATCH, "/rest/v1/customers")
            .query(&[("id", eq(&row.linked_customer))])
            .json(&serde_json::json!({ "is_active": active }));
        self.send_empty(request).await
    }

    async fn delete_customer_user(&self, customer_user_id: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE, "/rest/v1/customer_users")
            .query(&[("id", eq(customer_user_id))]);
        self.send_empty(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_filter() {
        assert_eq!(eq("a@b.c"), "eq.a@b.c");
    }

    #[test]
    fn test_first_row_required() {
        assert_eq!(first(vec![1, 2], "t").unwrap(), 1);
        assert!(matches!(
            first::<i32>(vec![], "customers"),
            Err(BackendError::Decode(_))
        ));
    }
}
