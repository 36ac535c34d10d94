// Authentication Module
// Stateless token authentication with OAuth2 social login

pub mod chain;
pub mod completion;
pub mod config;
pub mod cookies;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod identity;
pub mod login;
pub mod policy;
pub mod providers;
pub mod redirect_cookie;
pub mod token;

/// Login initiation: `/auth/authorize/{provider}`
pub const LOGIN_PATH_PREFIX: &str = "/auth/authorize/";

/// Provider callback: `/oauth2/callback/{provider}`
pub const CALLBACK_PATH_PREFIX: &str = "/oauth2/callback/";

pub use chain::{FilterChain, Interception, Interceptor, run_filter_chain};
pub use completion::{CallbackParams, OAuthCompletionHandler, oauth_callback};
pub use config::{AuthConfig, CookieConfig, ProviderConfig, ProvidersConfig};
pub use error::{AuthError, TokenError};
pub use filter::AuthenticationFilter;
pub use identity::{Authenticated, MaybeAuthenticated, RequestIdentity};
pub use login::ProviderRedirect;
pub use policy::AccessPolicy;
pub use providers::{IdentityProvider, ProviderProfile, ProviderRegistry};
pub use redirect_cookie::{PreservedRedirect, RedirectStatePreserver};
pub use token::{Claims, Clock, SystemClock, TokenCodec};
