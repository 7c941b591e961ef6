//! Authentication and authorization module
//!
//! - RSA password handshake and Argon2 hashing
//! - JWT access/refresh tokens backed by session rows
//! - Route-table driven access guard
//! - Symmetric data cipher

pub mod cipher;
pub mod guard;
pub mod jwt;
pub mod models;
pub mod password;
pub mod service;

pub use cipher::{CipherError, DataCipher};
pub use guard::{guard, Access, AuthenticatedUser, GuardState, RouteTable};
pub use jwt::{generate_token, validate_token, Claims, JwtConfig, JwtError, TokenKind};
pub use models::{
    AuthResponse, CsrfTokenResponse, LoginRequest, MessageResponse, SignupRequest, TokenPair,
};
pub use password::{
    validate_password_strength, verify_password, PasswordCodec, PasswordConfig, PasswordError,
};
pub use service::AuthService;
