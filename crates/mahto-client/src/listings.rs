//! Property catalog: listing CRUD, live browse queries, favourites and
//! share counters, plus the client-side refinements the browse screen
//! applies on top of the loaded list.
//!
//! Ownership is enforced here, not just gated in the UI: update and
//! delete verify the caller against the stored owner id first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use mahto_shared::constants::MAX_LISTING_IMAGES;
use mahto_shared::{PropertyCategory, PropertyId, UserId};
use mahto_store::schema::{
    favorite_writes, listing_from_doc, listing_patch_writes, new_listing_writes, share_writes,
    PROPERTIES,
};
use mahto_store::{
    DocumentStore, Filter, ListingDraft, ListingPatch, PropertyListing, Query, StoreError,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::Session;

/// Property listing operations for the signed-in user.
#[derive(Clone)]
pub struct PropertyCatalog {
    store: Arc<dyn DocumentStore>,
    session: Session,
    lookup_timeout: Duration,
}

impl PropertyCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, session: Session, config: &ClientConfig) -> Self {
        Self {
            store,
            session,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// Publish a new listing owned by the signed-in user.
    pub async fn create(&self, draft: ListingDraft) -> Result<PropertyId> {
        let owner = self.session.require()?;
        if draft.images.len() > MAX_LISTING_IMAGES {
            return Err(ClientError::TooManyImages(draft.images.len()));
        }

        let id = self
            .store
            .create(PROPERTIES, new_listing_writes(&draft, &owner))
            .await?;
        info!(property = %id, owner = %owner.short(), "listing published");
        Ok(PropertyId::new(id))
    }

    /// Live browse query, newest first, optionally narrowed to one
    /// category server-side.
    pub async fn observe_all(&self, category: Option<PropertyCategory>) -> Result<CatalogHandle> {
        let mut query = Query::new().order_desc("createdAt");
        if let Some(category) = category {
            query = query.filter(Filter::eq("category", category.as_str()));
        }
        self.observe_query(query).await
    }

    /// Live "my listings" query for the signed-in user.
    pub async fn observe_owned(&self) -> Result<CatalogHandle> {
        let owner = self.session.require()?;
        let query = Query::new()
            .filter(Filter::eq("ownerId", owner.as_str()))
            .order_desc("createdAt");
        self.observe_query(query).await
    }

    /// Live "saved properties" query: listings the signed-in user has
    /// favourited.
    pub async fn observe_saved(&self) -> Result<CatalogHandle> {
        let user = self.session.require()?;
        let query = Query::new()
            .filter(Filter::array_contains("likedBy", user.as_str()))
            .order_desc("createdAt");
        self.observe_query(query).await
    }

    async fn observe_query(&self, query: Query) -> Result<CatalogHandle> {
        let sub = self.store.subscribe(PROPERTIES, query).await?;
        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(async move {
            let mut sub = sub;
            while let Some(snapshot) = sub.next().await {
                let mut listings = Vec::with_capacity(snapshot.len());
                for doc in &snapshot {
                    match listing_from_doc(doc) {
                        Ok(listing) => listings.push(listing),
                        Err(e) => warn!(error = %e, "skipping malformed listing"),
                    }
                }
                tx.send_replace(listings);
            }
            debug!("catalog stream ended");
        });
        Ok(CatalogHandle { rx, task })
    }

    /// Live view of a single listing (detail screen: counters move as
    /// other users react).
    pub async fn observe_one(&self, id: &PropertyId) -> Result<ListingHandle> {
        let mut sub = self.store.subscribe_doc(PROPERTIES, id.as_str()).await?;
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            while let Some(snapshot) = sub.next().await {
                let listing = match &snapshot {
                    Some(doc) => match listing_from_doc(doc) {
                        Ok(listing) => Some(listing),
                        Err(e) => {
                            warn!(error = %e, "malformed listing document");
                            None
                        }
                    },
                    None => None,
                };
                tx.send_replace(listing);
            }
        });
        Ok(ListingHandle { rx, task })
    }

    /// Timeout-bounded point read of one listing.
    pub async fn get(&self, id: &PropertyId) -> Result<PropertyListing> {
        let doc = timeout(self.lookup_timeout, self.store.get(PROPERTIES, id.as_str()))
            .await
            .map_err(|_| ClientError::Timeout)??
            .ok_or_else(|| StoreError::NotFound(format!("{PROPERTIES}/{id}")))?;
        Ok(listing_from_doc(&doc)?)
    }

    /// Add or remove the signed-in user from a listing's favourites.
    /// Membership and counter move in one merge write, and repeating the
    /// same direction is a no-op for membership.
    pub async fn set_favorite(&self, id: &PropertyId, favorited: bool) -> Result<()> {
        let user = self.session.require()?;
        self.store
            .update(PROPERTIES, id.as_str(), favorite_writes(&user, favorited))
            .await?;
        debug!(property = %id, user = %user.short(), favorited, "favourite updated");
        Ok(())
    }

    /// Bump the share counter after the share sheet was used.
    pub async fn record_share(&self, id: &PropertyId) -> Result<()> {
        self.store
            .update(PROPERTIES, id.as_str(), share_writes())
            .await?;
        Ok(())
    }

    /// Edit a listing. Only the owner may do this.
    pub async fn update(&self, id: &PropertyId, patch: ListingPatch) -> Result<()> {
        self.require_owner(id).await?;
        if let Some(images) = &patch.images {
            if images.len() > MAX_LISTING_IMAGES {
                return Err(ClientError::TooManyImages(images.len()));
            }
        }
        self.store
            .update(PROPERTIES, id.as_str(), listing_patch_writes(&patch))
            .await?;
        info!(property = %id, "listing updated");
        Ok(())
    }

    /// Remove a listing. Only the owner may do this.
    pub async fn delete(&self, id: &PropertyId) -> Result<()> {
        self.require_owner(id).await?;
        self.store.delete(PROPERTIES, id.as_str()).await?;
        info!(property = %id, "listing deleted");
        Ok(())
    }

    async fn require_owner(&self, id: &PropertyId) -> Result<UserId> {
        let caller = self.session.require()?;
        let listing = self.get(id).await?;
        if listing.owner_id != caller {
            return Err(ClientError::NotOwner);
        }
        Ok(caller)
    }
}

/// Live view over a listing query.
pub struct CatalogHandle {
    rx: watch::Receiver<Vec<PropertyListing>>,
    task: JoinHandle<()>,
}

impl CatalogHandle {
    pub fn subscribe(&self) -> watch::Receiver<Vec<PropertyListing>> {
        self.rx.clone()
    }

    pub fn current(&self) -> Vec<PropertyListing> {
        self.rx.borrow().clone()
    }
}

impl Drop for CatalogHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live view over a single listing.
pub struct ListingHandle {
    rx: watch::Receiver<Option<PropertyListing>>,
    task: JoinHandle<()>,
}

impl ListingHandle {
    pub fn subscribe(&self) -> watch::Receiver<Option<PropertyListing>> {
        self.rx.clone()
    }

    pub fn current(&self) -> Option<PropertyListing> {
        self.rx.borrow().clone()
    }
}

impl Drop for ListingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Client-side refinements over the loaded list
// ---------------------------------------------------------------------------

/// Case-insensitive free-text search across title, description and
/// location. An empty query matches everything.
pub fn search(listings: &[PropertyListing], query: &str) -> Vec<PropertyListing> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return listings.to_vec();
    }
    listings
        .iter()
        .filter(|l| {
            l.title.to_lowercase().contains(&query)
                || l.description.to_lowercase().contains(&query)
                || l.location.to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

/// Keep listings whose human-entered location mentions any of the chosen
/// districts. No districts selected means no narrowing.
pub fn filter_by_districts(
    listings: &[PropertyListing],
    districts: &[String],
) -> Vec<PropertyListing> {
    if districts.is_empty() {
        return listings.to_vec();
    }
    let districts: Vec<String> = districts.iter().map(|d| d.to_lowercase()).collect();
    listings
        .iter()
        .filter(|l| {
            let location = l.location.to_lowercase();
            districts.iter().any(|d| location.contains(d))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mahto_shared::ListingKind;
    use mahto_store::{IdentityProvider, MemoryIdentity, MemoryStore};

    fn draft(title: &str, location: &str, category: PropertyCategory) -> ListingDraft {
        ListingDraft {
            title: title.into(),
            description: "Well ventilated".into(),
            price: "45 Lakh".into(),
            location: location.into(),
            category,
            listing_kind: ListingKind::Sell,
            images: vec!["file:///a.jpg".into()],
            bedrooms: Some(3),
            bathrooms: Some(2),
            area: Some("1500 sqft".into()),
        }
    }

    async fn signed_in_catalog() -> (PropertyCatalog, MemoryStore, UserId) {
        let store = MemoryStore::new();
        let identity = MemoryIdentity::new();
        let uid = identity.sign_up("a@mahto.app", "secret1").await.unwrap();
        let session = Session::new(Arc::new(identity), Arc::new(store.clone()));
        let catalog = PropertyCatalog::new(
            Arc::new(store.clone()),
            session,
            &ClientConfig::default(),
        );
        (catalog, store, uid)
    }

    async fn wait_until<T: Clone>(
        rx: &mut watch::Receiver<T>,
        mut pred: impl FnMut(&T) -> bool,
    ) -> T {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if pred(&rx.borrow()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.expect("watch sender dropped");
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn create_and_observe_by_category() {
        let (catalog, _store, uid) = signed_in_catalog().await;
        catalog
            .create(draft("3BHK Villa", "Ranchi, Jharkhand", PropertyCategory::Villa))
            .await
            .unwrap();
        catalog
            .create(draft("Farm plot", "Hazaribagh, Jharkhand", PropertyCategory::Land))
            .await
            .unwrap();

        let handle = catalog
            .observe_all(Some(PropertyCategory::Villa))
            .await
            .unwrap();
        let mut rx = handle.subscribe();
        let listings = wait_until(&mut rx, |l: &Vec<PropertyListing>| l.len() == 1).await;
        assert_eq!(listings[0].title, "3BHK Villa");
        assert_eq!(listings[0].owner_id, uid);
    }

    #[tokio::test]
    async fn image_cap_is_enforced() {
        let (catalog, _store, _uid) = signed_in_catalog().await;
        let mut too_many = draft("Overloaded", "Ranchi", PropertyCategory::Home);
        too_many.images = (0..6).map(|n| format!("file:///{n}.jpg")).collect();

        assert!(matches!(
            catalog.create(too_many).await,
            Err(ClientError::TooManyImages(6))
        ));

        // Nothing was written.
        let handle = catalog.observe_all(None).await.unwrap();
        let mut rx = handle.subscribe();
        wait_until(&mut rx, |l: &Vec<PropertyListing>| l.is_empty()).await;
    }

    #[tokio::test]
    async fn favourite_toggle_is_idempotent_per_direction() {
        let (catalog, _store, uid) = signed_in_catalog().await;
        let id = catalog
            .create(draft("3BHK Villa", "Ranchi", PropertyCategory::Villa))
            .await
            .unwrap();

        catalog.set_favorite(&id, true).await.unwrap();
        catalog.set_favorite(&id, true).await.unwrap();

        let listing = catalog.get(&id).await.unwrap();
        assert_eq!(listing.liked_by, vec![uid.clone()]);

        catalog.set_favorite(&id, false).await.unwrap();
        let listing = catalog.get(&id).await.unwrap();
        assert!(listing.liked_by.is_empty());
    }

    #[tokio::test]
    async fn saved_properties_follow_the_favorite_flag() {
        let (catalog, _store, _uid) = signed_in_catalog().await;
        let liked = catalog
            .create(draft("3BHK Villa", "Ranchi", PropertyCategory::Villa))
            .await
            .unwrap();
        catalog
            .create(draft("Farm plot", "Hazaribagh", PropertyCategory::Land))
            .await
            .unwrap();
        catalog.set_favorite(&liked, true).await.unwrap();

        let handle = catalog.observe_saved().await.unwrap();
        let mut rx = handle.subscribe();
        let saved = wait_until(&mut rx, |l: &Vec<PropertyListing>| l.len() == 1).await;
        assert_eq!(saved[0].id, liked);

        catalog.set_favorite(&liked, false).await.unwrap();
        wait_until(&mut rx, |l: &Vec<PropertyListing>| l.is_empty()).await;
    }

    #[tokio::test]
    async fn detail_view_tracks_live_counters() {
        let (catalog, _store, uid) = signed_in_catalog().await;
        let id = catalog
            .create(draft("3BHK Villa", "Ranchi", PropertyCategory::Villa))
            .await
            .unwrap();

        let handle = catalog.observe_one(&id).await.unwrap();
        let mut rx = handle.subscribe();
        wait_until(&mut rx, |l: &Option<PropertyListing>| l.is_some()).await;

        catalog.set_favorite(&id, true).await.unwrap();
        let listing = wait_until(&mut rx, |l: &Option<PropertyListing>| {
            l.as_ref().is_some_and(|l| l.likes == 1)
        })
        .await
        .expect("listing present");
        assert_eq!(listing.liked_by, vec![uid]);
    }

    #[tokio::test]
    async fn share_counter_increments() {
        let (catalog, _store, _uid) = signed_in_catalog().await;
        let id = catalog
            .create(draft("3BHK Villa", "Ranchi", PropertyCategory::Villa))
            .await
            .unwrap();
        catalog.record_share(&id).await.unwrap();
        catalog.record_share(&id).await.unwrap();
        assert_eq!(catalog.get(&id).await.unwrap().shares, 2);
    }

    #[tokio::test]
    async fn non_owner_cannot_update_or_delete() {
        let (catalog, store, _uid) = signed_in_catalog().await;
        let id = catalog
            .create(draft("3BHK Villa", "Ranchi", PropertyCategory::Villa))
            .await
            .unwrap();

        // A different signed-in user against the same store.
        let intruder_identity = MemoryIdentity::new();
        intruder_identity
            .sign_up("b@mahto.app", "secret1")
            .await
            .unwrap();
        let intruder = PropertyCatalog::new(
            Arc::new(store.clone()),
            Session::new(Arc::new(intruder_identity), Arc::new(store.clone())),
            &ClientConfig::default(),
        );

        assert!(matches!(
            intruder
                .update(
                    &id,
                    ListingPatch {
                        price: Some("1 Rupee".into()),
                        ..Default::default()
                    },
                )
                .await,
            Err(ClientError::NotOwner)
        ));
        assert!(matches!(
            intruder.delete(&id).await,
            Err(ClientError::NotOwner)
        ));

        // The listing is intact.
        let listing = catalog.get(&id).await.unwrap();
        assert_eq!(listing.price, "45 Lakh");
    }

    #[tokio::test]
    async fn owner_can_update_and_delete() {
        let (catalog, _store, _uid) = signed_in_catalog().await;
        let id = catalog
            .create(draft("3BHK Villa", "Ranchi", PropertyCategory::Villa))
            .await
            .unwrap();

        catalog
            .update(
                &id,
                ListingPatch {
                    price: Some("42 Lakh".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(catalog.get(&id).await.unwrap().price, "42 Lakh");

        catalog.delete(&id).await.unwrap();
        assert!(matches!(
            catalog.get(&id).await,
            Err(ClientError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn search_and_district_refinements() {
        let (catalog, _store, _uid) = signed_in_catalog().await;
        catalog
            .create(draft("3BHK Villa", "Ranchi, Jharkhand", PropertyCategory::Villa))
            .await
            .unwrap();
        catalog
            .create(draft("Farm plot", "Hazaribagh, Jharkhand", PropertyCategory::Land))
            .await
            .unwrap();

        let handle = catalog.observe_all(None).await.unwrap();
        let mut rx = handle.subscribe();
        let listings = wait_until(&mut rx, |l: &Vec<PropertyListing>| l.len() == 2).await;

        let hits = search(&listings, "villa");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "3BHK Villa");
        assert_eq!(search(&listings, "").len(), 2);

        let narrowed = filter_by_districts(&listings, &["Hazaribagh".to_string()]);
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].title, "Farm plot");
        assert_eq!(filter_by_districts(&listings, &[]).len(), 2);
    }
}
