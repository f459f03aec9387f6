pub mod authorization;
pub mod form;
pub mod option_list;
pub mod service;
pub mod service_config;
pub mod submission;
pub mod user;

pub use authorization::{AuthorizationStep, CreateAuthorizationStep, CreateSubzone, Subzone};
pub use form::{CreateFormField, FieldType, FormField};
pub use option_list::{
    CreateOptionList, CreateOptionListEntry, EntryCreated, OptionItem, OptionList,
    OptionListEntry,
};
pub use service::{CreateService, Service};
pub use service_config::{
    Availability, CreateServiceConfig, FormAvailability, ServiceConfig, SetAvailability,
};
pub use submission::{
    AuditEntry, FormData, GatewayStatus, PaymentDetails, PaymentStatus, Submission,
    SubmissionStatus,
};
pub use user::{Actor, Claims, CreateUser, Role, Session, TokenKind, TokenPair, User, UserProfile};
