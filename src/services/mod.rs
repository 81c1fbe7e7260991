/// Convenience flows built on the client: name resolution and auto-submit
use crate::clients::{ApiClient, Transport};
use crate::errors::ApiResult;
use crate::resources::{Resolve, Resource};
use tracing::{debug, warn};

/// Resolve a target name into `(ra, dec)` degrees.
pub async fn resolve_name<T: Transport>(
    client: &ApiClient<T>,
    name: &str,
) -> ApiResult<Option<(f64, f64)>> {
    let mut resolve = Resolve::new(name);
    if !client.get(&mut resolve).await? {
        return Ok(None);
    }
    debug!(name, resolver = ?resolve.resolver, "resolved");
    Ok(resolve.position())
}

/// Fill in the position of a resource that names its target but carries no
/// coordinates. Returns `false` if the name could not be resolved.
pub async fn locate<T: Transport, R: Resource>(
    client: &ApiClient<T>,
    resource: &mut R,
) -> ApiResult<bool> {
    if resource.has_position() {
        return Ok(true);
    }
    let Some(name) = resource.target_name().map(str::to_owned) else {
        return Ok(true);
    };
    match resolve_name(client, &name).await? {
        Some((ra, dec)) => {
            resource.set_position(ra, dec);
            Ok(true)
        }
        None => {
            warn!(name = %name, "could not resolve name");
            resource.status_mut().error("Could not resolve name.");
            Ok(false)
        }
    }
}

/// Submit a freshly built resource: resolve its name if needed, then GET it
/// when its parameters validate.
pub async fn fetch<T: Transport, R: Resource>(
    client: &ApiClient<T>,
    resource: &mut R,
) -> ApiResult<bool> {
    if !locate(client, resource).await? {
        return Ok(false);
    }
    client.get(resource).await
}
