use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{Storage, StorageResult};
use crate::{
    domain::{business::BusinessProfile, lead::Lead},
    error::StorageError,
};

/// In-process storage with the same upsert keys as the postgres tables.
#[derive(Default)]
pub struct MemoryStorage {
    profiles: Mutex<Vec<(String, BusinessProfile)>>,
    leads: Mutex<Vec<Lead>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    pub fn business_profiles(&self, user_id: &str) -> Vec<BusinessProfile> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, profile)| profile.clone())
            .collect()
    }

    pub fn leads(&self, user_id: &str) -> Vec<Lead> {
        self.leads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|lead| lead.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_business_profile(
        &self,
        user_id: &str,
        profile: &BusinessProfile,
    ) -> StorageResult {
        if profile.website_url.is_empty() {
            return StorageResult::failed(StorageError::Rejected("missing website url".to_string()));
        }

        let mut profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        match profiles
            .iter_mut()
            .find(|(owner, existing)| owner == user_id && existing.website_url == profile.website_url)
        {
            Some((_, existing)) => *existing = profile.clone(),
            None => profiles.push((user_id.to_string(), profile.clone())),
        }
        StorageResult::stored()
    }

    async fn create_lead(&self, lead: &Lead) -> StorageResult {
        if lead.name.is_empty() {
            return StorageResult::failed(StorageError::Rejected("missing name".to_string()));
        }

        let mut leads = self.leads.lock().unwrap_or_else(PoisonError::into_inner);
        match leads.iter_mut().find(|existing| {
            existing.user_id == lead.user_id
                && existing.website_url == lead.website_url
                && existing.name == lead.name
        }) {
            Some(existing) => *existing = lead.clone(),
            None => leads.push(lead.clone()),
        }
        StorageResult::stored()
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStorage;
    use crate::{
        dal::Storage,
        domain::{
            business::{BusinessProfile, TeamMember},
            contact::EnrichedTeamMember,
            lead::Lead,
        },
    };

    #[tokio::test]
    async fn profiles_upsert_per_user_and_url() {
        let storage = MemoryStorage::new();
        let mut profile = BusinessProfile::new("Acme", "https://acme.io/");

        assert!(storage.create_business_profile("u1", &profile).await.success);
        profile.name = "Acme Digital".to_string();
        assert!(storage.create_business_profile("u1", &profile).await.success);
        assert!(storage.create_business_profile("u2", &profile).await.success);

        let profiles = storage.business_profiles("u1");
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "Acme Digital");
    }

    #[tokio::test]
    async fn invalid_records_are_rejected_not_fatal() {
        let storage = MemoryStorage::new();

        let result = storage
            .create_business_profile("u1", &BusinessProfile::new("Acme", ""))
            .await;
        assert!(!result.success);
        assert!(result.error.is_some());

        let business = BusinessProfile::new("Acme", "https://acme.io/");
        let member =
            EnrichedTeamMember::fallback(&TeamMember::new("", "CEO"), "Acme", "n/a", vec![]);
        assert!(!storage.create_lead(&Lead::from_member("u1", &business, &member)).await.success);
        assert!(storage.leads("u1").is_empty());
    }
}
