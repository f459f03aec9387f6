use axum::Router;

/// A service module that contributes HTTP routes.
///
/// `docketd` collects every module and nests its routes under `/api/{name}`.
pub trait Module: Send + Sync {
    /// Module name, used for logging and the route prefix.
    fn name(&self) -> &str;

    /// Return the module's routes. Handlers must already carry their state.
    fn routes(&self) -> Router;
}
