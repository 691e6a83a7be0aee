//! Cluster object naming
//!
//! Secret names must be valid DNS subdomain names, so variable names and
//! directory paths are slugged before use.

/// Data key holding the value of an env secret
pub const ENV_SECRET_KEY: &str = "value";

/// Slug used for files directly under `secretfiles/`
pub const ROOT_GROUP_SLUG: &str = "root";

/// Secret holding one `.env` variable: `envsecret-<env>-<slug>`
pub fn env_secret_name(env: &str, var_name: &str) -> String {
    let slug = var_name.to_lowercase().replace('_', "-");
    format!("envsecret-{}-{}", env, slug)
}

/// Secret holding one `secretfiles/` directory: `mntsecret-<env>-<slug>`
pub fn mount_secret_name(env: &str, group: &str) -> String {
    let slug = if group.is_empty() {
        ROOT_GROUP_SLUG.to_string()
    } else {
        group
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
            .collect()
    };
    format!("mntsecret-{}-{}", env, slug)
}

/// Mount path of a `secretfiles/` directory inside the container
pub fn mount_path(group: &str) -> Option<String> {
    (!group.is_empty()).then(|| format!("/{}", group))
}

/// Split a path inside the container into its mount group and file name
///
/// `/etc/app/config.json` gives `("etc/app", "config.json")`. A path with
/// no directory cannot be mounted and gives `None`.
pub fn split_remote_path(remote: &str) -> Option<(&str, &str)> {
    let (dir, file) = remote.trim_start_matches('/').rsplit_once('/')?;
    let dir = dir.trim_end_matches('/');
    (!dir.is_empty() && !file.is_empty()).then_some((dir, file))
}

/// Default release name: `<chart>-<env>`
pub fn release_name(chart_name: &str, env: &str) -> String {
    format!("{}-{}", chart_name, env)
}

/// Generated docker-registry secret: `wiz-setup-imagepullsecret-<env>-<suffix>`
pub fn image_pull_secret_name(env: &str, suffix: &str) -> String {
    format!("wiz-setup-imagepullsecret-{}-{}", env, suffix)
}

/// Whether `name` is a valid DNS-1123 label
pub fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_secret_name() {
        assert_eq!(
            env_secret_name("staging", "DATABASE_URL"),
            "envsecret-staging-database-url"
        );
    }

    #[test]
    fn test_mount_secret_name() {
        assert_eq!(
            mount_secret_name("prod", "etc/app"),
            "mntsecret-prod-etc-app"
        );
        assert_eq!(
            mount_secret_name("prod", "Certs.d/TLS"),
            "mntsecret-prod-certs-d-tls"
        );
        assert_eq!(mount_secret_name("prod", ""), "mntsecret-prod-root");
    }

    #[test]
    fn test_mount_path() {
        assert_eq!(mount_path("etc/app").as_deref(), Some("/etc/app"));
        assert_eq!(mount_path(""), None);
    }

    #[test]
    fn test_split_remote_path() {
        assert_eq!(
            split_remote_path("/etc/app/config.json"),
            Some(("etc/app", "config.json"))
        );
        assert_eq!(split_remote_path("certs/tls.crt"), Some(("certs", "tls.crt")));
        assert_eq!(split_remote_path("/config.json"), None);
        assert_eq!(split_remote_path("config.json"), None);
        assert_eq!(split_remote_path("/etc/app/"), None);
    }

    #[test]
    fn test_image_pull_secret_name() {
        assert_eq!(
            image_pull_secret_name("dev", "a1b2c"),
            "wiz-setup-imagepullsecret-dev-a1b2c"
        );
    }

    #[test]
    fn test_dns_label() {
        assert!(is_dns_label("staging-3"));
        assert!(!is_dns_label("Staging"));
        assert!(!is_dns_label("-lead"));
        assert!(!is_dns_label("trail-"));
        assert!(!is_dns_label(""));
        assert!(!is_dns_label(&"a".repeat(64)));
    }
}
