//! The equipment projection: turns terminal equipment events into search documents.
//!
//! # Modes
//!
//! ```text
//!            replay_finished()
//!   Bulk ─────────────────────────▶ CatchUp
//!    │  records only, documents       │  every change is pushed to the
//!    │  imported once at the end      │  collection immediately
//! ```
//!
//! The projection starts in [`ProjectionMode::Bulk`]. During a full replay it only updates
//! its in-memory state; when the replay finishes it bulk-imports every indexable record
//! and switches to [`ProjectionMode::CatchUp`] for good.
//!
//! # Indexability
//!
//! A record becomes a [`SearchDocument`] only when its specification is registered (its
//! name is in the allow-list) and its name is non-empty after trimming.
//!
//! The projection also remembers which ids currently have a document in the collection.
//! A specification registered during catch-up makes its existing records indexable without
//! writing them; the next event touching such a record creates its document instead of
//! updating a missing one.
//!
//! # Dispatch
//!
//! Routing is plain data: [`execution`] maps `(mode, kind)` to an [`Execution`], and
//! [`naming_transition`] / [`specification_transition`] map indexability before and after
//! a change to an [`IndexTransition`]. Only the projection itself performs I/O.

use crate::events::{
    EquipmentEvent, EquipmentPlaced, EquipmentRemoved, EventKind, NamingInfoChanged,
    SUBSCRIBED_EVENT_TYPES, SpecificationAdded, SpecificationChanged,
};
use equipment_search_core::event::{Event, SerializedEvent};
use equipment_search_core::projection::{Projection, ProjectionError, Result};
use equipment_search_core::search::{SearchDocument, SearchIndex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Documents per bulk import request.
pub const IMPORT_BATCH_SIZE: usize = 100;

/// Projection mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Full replay in progress; changes are buffered in memory.
    Bulk,
    /// Steady state; changes are applied to the collection immediately.
    CatchUp,
}

/// How an event is executed in a given mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Execution {
    /// Only the specification registry changes; never touches the index.
    RegistryOnly,
    /// In-memory state changes; documents are produced by the final bulk import.
    Buffered,
    /// In-memory state changes and the index is mutated right away.
    Immediate,
}

/// Select the execution for an event kind in a mode.
#[must_use]
pub const fn execution(mode: ProjectionMode, kind: EventKind) -> Execution {
    match (mode, kind) {
        (_, EventKind::SpecificationAdded) => Execution::RegistryOnly,
        (ProjectionMode::Bulk, _) => Execution::Buffered,
        (ProjectionMode::CatchUp, _) => Execution::Immediate,
    }
}

/// Index mutation implied by a change of indexability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexTransition {
    /// Insert or replace the document
    Upsert,
    /// Update the existing document
    Update,
    /// Delete the document
    Delete,
    /// No remote call
    Unchanged,
}

/// Transition for a rename, given whether the record was and is indexable.
#[must_use]
pub const fn naming_transition(was_indexable: bool, is_indexable: bool) -> IndexTransition {
    match (was_indexable, is_indexable) {
        (false, true) => IndexTransition::Upsert,
        (true, true) => IndexTransition::Update,
        (true, false) => IndexTransition::Delete,
        (false, false) => IndexTransition::Unchanged,
    }
}

/// Transition for a specification change.
///
/// `was_registered` only looks at the old specification; `is_indexable` is the full
/// indexability of the record after the change. A document that was indexable before and
/// after keeps its content, since neither id nor name changed.
#[must_use]
pub const fn specification_transition(
    was_registered: bool,
    is_indexable: bool,
) -> IndexTransition {
    match (was_registered, is_indexable) {
        (true, false) => IndexTransition::Delete,
        (false, true) => IndexTransition::Upsert,
        (true, true) | (false, false) => IndexTransition::Unchanged,
    }
}

/// In-memory state of one terminal equipment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquipmentRecord {
    /// Equipment id
    pub id: Uuid,
    /// Display name, if any
    pub name: Option<String>,
    /// Current specification
    pub specification_id: Uuid,
}

impl EquipmentRecord {
    /// The name, if it is non-empty after trimming.
    #[must_use]
    pub fn searchable_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.trim().is_empty())
    }

    fn to_document(&self) -> Option<SearchDocument> {
        self.searchable_name()
            .map(|name| SearchDocument::new(self.id.to_string(), name))
    }
}

/// Allow-listed specifications discovered in the event stream.
#[derive(Clone, Debug, Default)]
pub struct SpecificationRegistry {
    allowed: HashSet<String>,
    registered: HashMap<Uuid, String>,
}

impl SpecificationRegistry {
    /// Create an empty registry for an allow-list of specification names.
    ///
    /// Duplicate names in the allow-list count once.
    #[must_use]
    pub fn new<I, N>(allowed_names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            allowed: allowed_names.into_iter().map(Into::into).collect(),
            registered: HashMap::new(),
        }
    }

    /// Register a specification if its name is allow-listed.
    ///
    /// Returns `true` when the specification was newly registered. A duplicate id keeps
    /// the first name.
    pub fn register(&mut self, id: Uuid, name: &str) -> bool {
        if !self.allowed.contains(name) || self.registered.contains_key(&id) {
            return false;
        }
        self.registered.insert(id, name.to_string());
        true
    }

    /// Whether `id` is a registered specification.
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        self.registered.contains_key(id)
    }

    /// Name of a registered specification.
    #[must_use]
    pub fn name(&self, id: &Uuid) -> Option<&str> {
        self.registered.get(id).map(String::as_str)
    }

    /// Number of registered specifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Check that every allow-listed name was discovered.
    ///
    /// Only the counts are compared.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Configuration`] if the registry size differs from the
    /// allow-list size.
    pub fn verify_complete(&self) -> Result<()> {
        if self.registered.len() == self.allowed.len() {
            Ok(())
        } else {
            Err(ProjectionError::Configuration {
                expected: self.allowed.len(),
                found: self.registered.len(),
            })
        }
    }
}

/// Projection from terminal equipment events to an equipment search collection.
///
/// # Example
///
/// ```ignore
/// let search = Arc::new(TypesenseClient::builder().api_key(key).build()?);
/// let mut projection = EquipmentProjection::new(search, "equipments-7d1e…", ["Splice Closure"]);
///
/// event_store.replay_all(&mut projection).await?; // bulk import + switch to CatchUp
/// event_store.catch_up(&mut projection).await?;   // immediate mutations
/// ```
pub struct EquipmentProjection<S> {
    search: Arc<S>,
    collection: String,
    mode: ProjectionMode,
    registry: SpecificationRegistry,
    equipment: HashMap<Uuid, EquipmentRecord>,
    indexed: HashSet<Uuid>,
}

impl<S> EquipmentProjection<S>
where
    S: SearchIndex,
{
    /// Create a projection writing to `collection`, starting in [`ProjectionMode::Bulk`].
    #[must_use]
    pub fn new<I, N>(search: Arc<S>, collection: impl Into<String>, specification_names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            search,
            collection: collection.into(),
            mode: ProjectionMode::Bulk,
            registry: SpecificationRegistry::new(specification_names),
            equipment: HashMap::new(),
            indexed: HashSet::new(),
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Collection this projection writes to.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The specification registry.
    #[must_use]
    pub const fn registry(&self) -> &SpecificationRegistry {
        &self.registry
    }

    /// State of one equipment.
    #[must_use]
    pub fn record(&self, id: &Uuid) -> Option<&EquipmentRecord> {
        self.equipment.get(id)
    }

    /// Whether `id` currently has a document in the collection.
    #[must_use]
    pub fn is_indexed(&self, id: &Uuid) -> bool {
        self.indexed.contains(id)
    }

    /// Number of known equipment records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.equipment.len()
    }

    /// Whether no equipment is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty()
    }

    /// Documents for every indexable record, sorted by id.
    #[must_use]
    pub fn documents(&self) -> Vec<SearchDocument> {
        let mut documents: Vec<_> = self
            .equipment
            .values()
            .filter(|record| self.registry.contains(&record.specification_id))
            .filter_map(EquipmentRecord::to_document)
            .collect();
        documents.sort();
        documents
    }

    fn is_indexable(&self, record: &EquipmentRecord) -> bool {
        self.registry.contains(&record.specification_id) && record.searchable_name().is_some()
    }

    /// Apply one decoded event.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::SearchIndex`] if an immediate index mutation fails.
    pub async fn handle(&mut self, event: EquipmentEvent) -> Result<()> {
        let kind = event.kind();
        let execution = execution(self.mode, kind);
        tracing::trace!(event_type = kind.type_name(), ?execution, "Applying event");

        match event {
            EquipmentEvent::Placed(placed) => self.on_placed(placed, execution).await?,
            EquipmentEvent::NamingInfoChanged(changed) => {
                self.on_naming_info_changed(changed, execution).await?;
            }
            EquipmentEvent::SpecificationAdded(added) => self.on_specification_added(&added),
            EquipmentEvent::SpecificationChanged(changed) => {
                self.on_specification_changed(&changed, execution).await?;
            }
            EquipmentEvent::Removed(removed) => self.on_removed(&removed, execution).await?,
        }

        metrics::counter!("projection.events.applied", "event_type" => kind.type_name())
            .increment(1);
        Ok(())
    }

    async fn on_placed(&mut self, placed: EquipmentPlaced, execution: Execution) -> Result<()> {
        let record = EquipmentRecord {
            id: placed.equipment.id,
            name: placed.equipment.name,
            specification_id: placed.equipment.specification_id,
        };

        let id = record.id;
        if execution == Execution::Immediate {
            match (self.is_indexable(&record), record.to_document()) {
                (true, Some(document)) => self.upsert(&document, id).await?,
                // A re-placement replaced an indexed record with an unindexable one.
                (false, _) if self.indexed.contains(&id) => self.delete(&id).await?,
                _ => {}
            }
        }

        if self.equipment.insert(id, record).is_some() {
            tracing::debug!(equipment_id = %id, "Equipment placed again, replacing record");
        }
        Ok(())
    }

    async fn on_naming_info_changed(
        &mut self,
        changed: NamingInfoChanged,
        execution: Execution,
    ) -> Result<()> {
        let id = changed.terminal_equipment_id;
        let Some(record) = self.equipment.get(&id) else {
            tracing::warn!(
                equipment_id = %id,
                "Naming info changed for unknown equipment, ignoring"
            );
            return Ok(());
        };

        let was_indexable = self.is_indexable(record);
        let mut updated = record.clone();
        updated.name = changed.naming_info.name;
        let is_indexable = self.is_indexable(&updated);

        if execution == Execution::Immediate {
            let transition = match naming_transition(was_indexable, is_indexable) {
                // Indexable since a catch-up registration, but never written
                IndexTransition::Update if !self.indexed.contains(&id) => {
                    IndexTransition::Upsert
                }
                transition => transition,
            };
            match (transition, updated.to_document()) {
                (IndexTransition::Upsert, Some(document)) => self.upsert(&document, id).await?,
                (IndexTransition::Update, Some(document)) => self.update(&document, id).await?,
                (IndexTransition::Delete, _) => self.delete(&id).await?,
                _ => {}
            }
        }

        self.equipment.insert(id, updated);
        Ok(())
    }

    fn on_specification_added(&mut self, added: &SpecificationAdded) {
        let specification = &added.specification;
        if self.registry.register(specification.id, &specification.name) {
            tracing::info!(
                specification_id = %specification.id,
                specification = %specification.name,
                "Registered allow-listed specification"
            );
        }
    }

    async fn on_specification_changed(
        &mut self,
        changed: &SpecificationChanged,
        execution: Execution,
    ) -> Result<()> {
        let id = changed.terminal_equipment_id;
        let Some(record) = self.equipment.get(&id) else {
            tracing::warn!(
                equipment_id = %id,
                "Specification changed for unknown equipment, ignoring"
            );
            return Ok(());
        };

        let was_registered = self.registry.contains(&record.specification_id);
        let mut updated = record.clone();
        updated.specification_id = changed.new_specification_id;
        let is_indexable = self.is_indexable(&updated);

        if execution == Execution::Immediate {
            let transition = match specification_transition(was_registered, is_indexable) {
                // Indexable since a catch-up registration, but never written
                IndexTransition::Unchanged if is_indexable && !self.indexed.contains(&id) => {
                    IndexTransition::Upsert
                }
                transition => transition,
            };
            match (transition, updated.to_document()) {
                (IndexTransition::Upsert, Some(document)) => self.upsert(&document, id).await?,
                (IndexTransition::Delete, _) => self.delete(&id).await?,
                _ => {}
            }
        }

        self.equipment.insert(id, updated);
        Ok(())
    }

    async fn on_removed(&mut self, removed: &EquipmentRemoved, execution: Execution) -> Result<()> {
        let id = removed.terminal_equipment_id;
        if !self.equipment.contains_key(&id) {
            tracing::warn!(equipment_id = %id, "Removal of unknown equipment, ignoring");
            return Ok(());
        }

        if execution == Execution::Immediate {
            self.delete(&id).await?;
        }

        self.equipment.remove(&id);
        Ok(())
    }

    async fn upsert(&mut self, document: &SearchDocument, id: Uuid) -> Result<()> {
        self.search
            .upsert_document(&self.collection, document)
            .await?;
        self.indexed.insert(id);
        metrics::counter!("search.documents.upserted").increment(1);
        tracing::debug!(equipment_id = %document.id, name = %document.name, "Upserted document");
        Ok(())
    }

    async fn update(&mut self, document: &SearchDocument, id: Uuid) -> Result<()> {
        match self
            .search
            .update_document(&self.collection, &document.id, document)
            .await
        {
            Ok(()) => {
                metrics::counter!("search.documents.updated").increment(1);
                tracing::debug!(
                    equipment_id = %document.id,
                    name = %document.name,
                    "Updated document"
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    equipment_id = %document.id,
                    "Document missing on update, upserting"
                );
                self.upsert(document, id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&mut self, id: &Uuid) -> Result<()> {
        self.indexed.remove(id);
        match self
            .search
            .delete_document(&self.collection, &id.to_string())
            .await
        {
            Ok(()) => {
                metrics::counter!("search.documents.deleted").increment(1);
                tracing::debug!(equipment_id = %id, "Deleted document");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(equipment_id = %id, "Document already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Finish a full replay: verify the registry, bulk-import every indexable record and
    /// switch to [`ProjectionMode::CatchUp`].
    ///
    /// Returns the number of imported documents. Documents are sent in requests of
    /// [`IMPORT_BATCH_SIZE`]; an empty projection sends nothing.
    ///
    /// # Errors
    ///
    /// - [`ProjectionError::Configuration`] if not every allow-listed specification was seen
    /// - [`ProjectionError::EventProcessing`] if the projection already left bulk mode
    /// - [`ProjectionError::SearchIndex`] if an import request fails
    pub async fn finalize_bulk_load(&mut self) -> Result<usize> {
        if self.mode != ProjectionMode::Bulk {
            return Err(ProjectionError::EventProcessing(
                "replay already finished, projection is in catch-up mode".to_string(),
            ));
        }

        self.registry.verify_complete()?;

        let documents = self.documents();
        self.indexed.clear();
        let mut imported = 0;
        for batch in documents.chunks(IMPORT_BATCH_SIZE) {
            imported += self
                .search
                .import_documents(&self.collection, batch, IMPORT_BATCH_SIZE)
                .await?;
            self.indexed
                .extend(batch.iter().filter_map(|document| document.id.parse::<Uuid>().ok()));
        }
        metrics::counter!("search.documents.imported").increment(imported as u64);

        self.mode = ProjectionMode::CatchUp;
        tracing::info!(
            collection = %self.collection,
            imported,
            equipment = self.equipment.len(),
            specifications = self.registry.len(),
            "Bulk load finished, switching to catch-up"
        );
        Ok(imported)
    }
}

impl<S> Projection for EquipmentProjection<S>
where
    S: SearchIndex,
{
    fn name(&self) -> &str {
        "equipment_search"
    }

    fn event_types(&self) -> &[&'static str] {
        SUBSCRIBED_EVENT_TYPES
    }

    async fn apply_event(&mut self, event: &SerializedEvent) -> Result<()> {
        let event = EquipmentEvent::from_serialized(event)?;
        self.handle(event).await
    }

    async fn replay_finished(&mut self) -> Result<()> {
        self.finalize_bulk_load().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specification_added_is_registry_only_in_both_modes() {
        for mode in [ProjectionMode::Bulk, ProjectionMode::CatchUp] {
            assert_eq!(
                execution(mode, EventKind::SpecificationAdded),
                Execution::RegistryOnly
            );
        }
    }

    #[test]
    fn equipment_events_are_buffered_in_bulk_and_immediate_in_catch_up() {
        for kind in [
            EventKind::Placed,
            EventKind::NamingInfoChanged,
            EventKind::SpecificationChanged,
            EventKind::Removed,
        ] {
            assert_eq!(execution(ProjectionMode::Bulk, kind), Execution::Buffered);
            assert_eq!(execution(ProjectionMode::CatchUp, kind), Execution::Immediate);
        }
    }

    #[test]
    fn naming_transitions() {
        assert_eq!(naming_transition(false, true), IndexTransition::Upsert);
        assert_eq!(naming_transition(true, true), IndexTransition::Update);
        assert_eq!(naming_transition(true, false), IndexTransition::Delete);
        assert_eq!(naming_transition(false, false), IndexTransition::Unchanged);
    }

    #[test]
    fn specification_transitions() {
        assert_eq!(specification_transition(true, false), IndexTransition::Delete);
        assert_eq!(specification_transition(false, true), IndexTransition::Upsert);
        assert_eq!(specification_transition(true, true), IndexTransition::Unchanged);
        assert_eq!(specification_transition(false, false), IndexTransition::Unchanged);
    }

    #[test]
    fn registry_only_accepts_allow_listed_names() {
        let mut registry = SpecificationRegistry::new(["Splice Closure"]);
        let allowed = Uuid::new_v4();

        assert!(registry.register(allowed, "Splice Closure"));
        assert!(!registry.register(Uuid::new_v4(), "Patch Panel"));

        assert!(registry.contains(&allowed));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_registration_keeps_first_name() {
        let mut registry = SpecificationRegistry::new(["Splice Closure", "Tray"]);
        let id = Uuid::new_v4();

        assert!(registry.register(id, "Splice Closure"));
        assert!(!registry.register(id, "Tray"));

        assert_eq!(registry.name(&id), Some("Splice Closure"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn incomplete_registry_is_a_configuration_error() {
        let mut registry = SpecificationRegistry::new(["A", "B"]);
        registry.register(Uuid::new_v4(), "A");

        let result = registry.verify_complete();

        assert!(matches!(
            result,
            Err(ProjectionError::Configuration {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn empty_allow_list_is_complete() {
        assert!(SpecificationRegistry::new(Vec::<String>::new()).verify_complete().is_ok());
    }

    #[test]
    fn whitespace_name_is_not_searchable() {
        let record = EquipmentRecord {
            id: Uuid::new_v4(),
            name: Some("   ".to_string()),
            specification_id: Uuid::new_v4(),
        };

        assert_eq!(record.searchable_name(), None);
        assert_eq!(record.to_document(), None);
    }
}
