//! Path and name validation
//!
//! Request paths and template file arguments come straight from the browser
//! or from installed templates; neither may reach outside its root.

use crate::error::ServerError;

/// Whether `path` contains a `..` sequence anywhere, `a..b` included
pub fn is_traversal(path: &str) -> bool {
    path.contains("..")
}

/// Strip the query string from a request target and reject traversal
///
/// Returns the path part, always starting with `/`.
pub fn sanitize_request_path(target: &str) -> Result<String, ServerError> {
    let path = target.split('?').next().unwrap_or("");

    if path.contains('\0') {
        return Err(ServerError::Forbidden("Path contains null byte".to_string()));
    }
    if is_traversal(path) {
        return Err(ServerError::Forbidden(format!(
            "Path contains invalid parent directory reference: {}",
            path
        )));
    }

    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Ok(format!("/{}", path))
    }
}

/// Reject a redirect target that would split the `Location` header
pub fn validate_redirect(location: &str) -> Result<(), ServerError> {
    if location.contains(['\r', '\n']) {
        return Err(ServerError::Forbidden(format!(
            "Redirect target contains a line break: {:?}",
            location
        )));
    }
    Ok(())
}

/// Validate a project name before it is joined to the websites directory
pub fn validate_project_name(name: &str) -> Result<(), ServerError> {
    if name.is_empty() {
        return Err(ServerError::Persistence(
            "Project name cannot be empty".to_string(),
        ));
    }

    if is_traversal(name) || name.contains('/') || name.contains('\\') {
        return Err(ServerError::Forbidden(format!(
            "Invalid project name '{}': path separators are not allowed",
            name
        )));
    }

    Ok(())
}
