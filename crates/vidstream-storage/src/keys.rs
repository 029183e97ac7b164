//! Shared key generation for storage backends.

use uuid::Uuid;

/// Generate a storage key for the given tenant and filename.
///
/// Produces `videos/{tenant_id}/{filename}`. All backends must use this
/// format so keys stay addressable across backend migrations.
pub fn generate_storage_key(tenant_id: Uuid, filename: &str) -> String {
    format!("videos/{}/{}", tenant_id, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_tenant_scoped() {
        let tenant = Uuid::new_v4();
        let key = generate_storage_key(tenant, "clip.mp4");
        assert_eq!(key, format!("videos/{}/clip.mp4", tenant));
    }
}
