// handlers/protected/mod.rs - handlers that require a verified caller
//
// Routes here sit behind `jwt_auth_middleware`, which places an `AuthUser`
// in the request extensions. Ownership checks happen in the service.
pub mod todos;
