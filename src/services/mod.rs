pub mod auth_service;
pub mod booking_service;
pub mod credential_service;
pub mod identity_provider;
pub mod oauth_completion;
pub mod role_handoff;
pub mod session_service;
pub mod user_service;

pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use booking_service::{BookingService, BookingServiceError};
pub use credential_service::{CredentialIssuer, CredentialService, ValidatedToken};
pub use identity_provider::{
    ExternalIdentity, HttpIdentityProvider, IdentityProvider, IdentityProviderError,
    IdentityProviderRegistry, ProviderConfig, ProviderKind,
};
pub use oauth_completion::{reconcile_role, CompletionOutcome, OAuthCompletion};
pub use role_handoff::{
    HandoffError, InMemoryRoleHandoffStore, RoleHandoffStore, SqliteRoleHandoffStore,
};
pub use session_service::{SessionService, SessionServiceError};
pub use user_service::{CreateUserRequest, UpdatePasswordRequest, UserService, UserServiceError};
