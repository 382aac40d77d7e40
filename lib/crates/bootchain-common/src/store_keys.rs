/// Coordination-store path layout for bootchain state
pub mod keys {
    /// Root of every application's subtree
    /// Format: /bootchain
    pub const ROOT: &str = "/bootchain";

    /// Application description published by `bootchain deploy`
    /// Format: /bootchain/{app}/description
    /// Value: JSON-serialized AppDescription
    /// Owner: the CLI
    pub const DESCRIPTION: &str = "description";

    /// Parent of all container descriptor nodes
    /// Format: /bootchain/{app}/containers
    pub const CONTAINERS: &str = "containers";

    /// Container descriptor
    /// Format: /bootchain/{app}/containers/{container}
    /// Value: JSON-serialized Descriptor
    /// Owner: that container's agent
    ///
    /// Run state of a container's main process
    /// Format: /bootchain/{app}/containers/{container}/status
    /// Value: RunStatus as string (not_running | running | initialized | failed)
    /// Owner: that container's agent
    pub const STATUS: &str = "status";

    /// Shutdown request; every agent of the app stops when this node appears
    /// Format: /bootchain/{app}/shutdown
    /// Value: RFC3339 timestamp of the request
    /// Owner: the CLI
    pub const SHUTDOWN: &str = "shutdown";
}

pub fn app_path(app: &str) -> String {
    format!("{}/{}", keys::ROOT, app)
}

pub fn description_path(app: &str) -> String {
    format!("{}/{}", app_path(app), keys::DESCRIPTION)
}

pub fn containers_path(app: &str) -> String {
    format!("{}/{}", app_path(app), keys::CONTAINERS)
}

pub fn descriptor_path(app: &str, container: &str) -> String {
    format!("{}/{}", containers_path(app), container)
}

pub fn status_path(app: &str, container: &str) -> String {
    format!("{}/{}", descriptor_path(app, container), keys::STATUS)
}

pub fn shutdown_path(app: &str) -> String {
    format!("{}/{}", app_path(app), keys::SHUTDOWN)
}

/// Parent of `path`, or `None` for the root and for malformed paths.
pub fn parent(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    match idx {
        0 if path.len() > 1 => Some("/"),
        0 => None,
        _ => Some(&path[..idx]),
    }
}

/// Last segment of `path`.
pub fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Validate that `path` is absolute, has no empty segments and no trailing slash.
/// Returns Ok(()) if valid, Err with description if invalid.
/// Call before turning a path into backend keys.
pub fn validate_path(path: &str) -> Result<(), &'static str> {
    if !path.starts_with('/') {
        return Err("path must start with '/'");
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err("path must not end with '/'");
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err("path must not contain empty segments");
    }
    if path.chars().any(char::is_whitespace) {
        return Err("path must not contain whitespace");
    }
    Ok(())
}
