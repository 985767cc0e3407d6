//! Backend endpoint paths, relative to the configured base URL.

pub const LOGIN: &str = "/api/auth/login/";
pub const TWO_FA_LOGIN: &str = "/api/auth/login/2fa/";
pub const REGISTER: &str = "/api/auth/register/";
pub const REGISTER_VERIFY: &str = "/api/auth/register/verify/";
pub const LOGOUT: &str = "/api/auth/logout/";

pub const PROFILE: &str = "/api/entregadores/me/";
