//! Data models shared by the backends, the auth façade and the views.

mod customer;
mod image;
mod principal;

pub use customer::{
    ContactType, Customer, CustomerSignupData, CustomerSummary, CustomerUser, NewCustomer,
    NewCustomerUser,
};
pub use image::{Brand, ImageItem, StorageObject};
pub use principal::{AuthUser, Principal, Role};
