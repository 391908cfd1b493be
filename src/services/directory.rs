//! Community directory bootstrap.
//!
//! One community exists per city. Each community is seeded with the
//! default four-level tier ladder (level 1 public, the rest invite-only)
//! and an announcement channel id. Seeding is idempotent and runs at
//! startup and on demand from the admin surface.

use std::sync::Arc;

use chrono::Utc;

use crate::errors::AppResult;
use crate::models::{Community, LegacyGroup, SubGroup};
use crate::store::{from_doc, to_doc, Collection, DocumentStore, Filter};

use super::new_id;

/// The 81 provinces; each gets exactly one community.
pub const CITIES: [&str; 81] = [
    "Adana", "Adıyaman", "Afyonkarahisar", "Ağrı", "Aksaray", "Amasya", "Ankara", "Antalya",
    "Ardahan", "Artvin", "Aydın", "Balıkesir", "Bartın", "Batman", "Bayburt", "Bilecik",
    "Bingöl", "Bitlis", "Bolu", "Burdur", "Bursa", "Çanakkale", "Çankırı", "Çorum",
    "Denizli", "Diyarbakır", "Düzce", "Edirne", "Elazığ", "Erzincan", "Erzurum", "Eskişehir",
    "Gaziantep", "Giresun", "Gümüşhane", "Hakkari", "Hatay", "Iğdır", "Isparta", "İstanbul",
    "İzmir", "Kahramanmaraş", "Karabük", "Karaman", "Kars", "Kastamonu", "Kayseri", "Kilis",
    "Kırıkkale", "Kırklareli", "Kırşehir", "Kocaeli", "Konya", "Kütahya", "Malatya", "Manisa",
    "Mardin", "Mersin", "Muğla", "Muş", "Nevşehir", "Niğde", "Ordu", "Osmaniye",
    "Rize", "Sakarya", "Samsun", "Şanlıurfa", "Siirt", "Sinop", "Sivas", "Şırnak",
    "Tekirdağ", "Tokat", "Trabzon", "Tunceli", "Uşak", "Van", "Yalova", "Yozgat", "Zonguldak",
];

struct TierTemplate {
    name: &'static str,
    description: &'static str,
    level: i64,
}

/// Default ladder. Only level 1 is public; everything above is reached by
/// approval or promotion.
const DEFAULT_TIERS: [TierTemplate; 4] = [
    TierTemplate { name: "Start", description: "Entry group for new members", level: 1 },
    TierTemplate { name: "Growth", description: "Developing members", level: 2 },
    TierTemplate { name: "Evaluation", description: "Members under evaluation", level: 3 },
    TierTemplate { name: "Core", description: "Core member group", level: 4 },
];

/// Nationwide default flat group, created once.
const COUNTRY_GROUP_ID: &str = "group-turkiye";

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn DocumentStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Ensure every city community (with its ladder) and the default flat
    /// groups exist. Returns how many communities were newly created.
    pub async fn seed(&self) -> AppResult<usize> {
        let mut created = 0;
        for city in CITIES {
            if self.find_city_community(city).await?.is_none() {
                self.create_city_community(city).await?;
                created += 1;
            }
        }
        self.ensure_default_groups().await?;
        if created > 0 {
            tracing::info!("Seeded {} city communities", created);
        }
        Ok(created)
    }

    pub async fn find_city_community(&self, city: &str) -> AppResult<Option<Community>> {
        let doc = self
            .store
            .find_one(Collection::Communities, &Filter::field("city", city))
            .await?;
        Ok(doc.map(from_doc).transpose()?)
    }

    /// City community lookup, creating it on first use. Registration for a
    /// city not in the seed list still gets a community.
    pub async fn ensure_city_community(&self, city: &str) -> AppResult<Community> {
        if let Some(existing) = self.find_city_community(city).await? {
            return Ok(existing);
        }
        self.create_city_community(city).await
    }

    async fn create_city_community(&self, city: &str) -> AppResult<Community> {
        let community_id = new_id();
        let now = Utc::now();

        let mut sub_group_ids = Vec::with_capacity(DEFAULT_TIERS.len());
        for tier in &DEFAULT_TIERS {
            let sub_group = SubGroup {
                id: new_id(),
                community_id: community_id.clone(),
                name: tier.name.to_string(),
                description: Some(tier.description.to_string()),
                image_url: None,
                level: tier.level,
                group_admins: vec![],
                members: vec![],
                pending_requests: vec![],
                is_public: tier.level == 1,
                created_by: "system".into(),
                created_by_name: "System".into(),
                created_at: now,
            };
            self.store
                .insert(Collection::SubGroups, to_doc(&sub_group)?)
                .await?;
            sub_group_ids.push(sub_group.id);
        }

        let community = Community {
            id: community_id.clone(),
            name: format!("{city} Community"),
            description: Some(format!("Community for {city}")),
            city: city.to_string(),
            image_url: None,
            super_admins: vec![],
            members: vec![],
            sub_groups: sub_group_ids,
            announcement_channel_id: Some(format!("announcement-{community_id}")),
            created_by: "system".into(),
            created_by_name: "System".into(),
            created_at: now,
        };
        self.store
            .insert(Collection::Communities, to_doc(&community)?)
            .await?;
        Ok(community)
    }

    async fn ensure_default_groups(&self) -> AppResult<()> {
        let existing = self
            .store
            .find_one(Collection::Groups, &Filter::id(COUNTRY_GROUP_ID))
            .await?;
        if existing.is_some() {
            return Ok(());
        }
        let group = LegacyGroup {
            id: COUNTRY_GROUP_ID.into(),
            name: "Türkiye Network".into(),
            description: Some("Nationwide discussion group".into()),
            image_url: None,
            city: "Türkiye".into(),
            is_public: true,
            created_by: "system".into(),
            created_by_name: "System".into(),
            members: vec![],
            admins: vec![],
            banned_users: vec![],
            restricted_users: vec![],
            pinned_messages: vec![],
            created_at: Utc::now(),
        };
        self.store.insert(Collection::Groups, to_doc(&group)?).await?;
        Ok(())
    }
}
