#![allow(dead_code)]

use fieldcare_core::{
    AttributeCatalog, AttributeIngestor, DbHandle, Patient, PatientImporter, PreferredAddress,
    RawAttribute, StaticAttributeTypeSource,
};
use fieldcare_core::repo::address_repo::{AddressRepository, SqliteAddressRepository};
use fieldcare_core::repo::patient_repo::{PatientRepository, SqlitePatientRepository};
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

pub const PATIENT_JSON: &str = include_str!("../fixtures/patient.json");
pub const ATTRIBUTE_TYPES_JSON: &str = include_str!("../fixtures/patientAttributeTypes.json");
pub const BASE_URL: &str = "https://somehost.com/";

pub const FIXTURE_PATIENT_UUID: &str = "e34992ca-894f-4344-b4b3-54a4aa1e5558";
pub const SECOND_PATIENT_UUID: &str = "f1a2b3c4-0000-4000-8000-000000000002";

/// On-disk store seeded with the registration fixture plus a second patient.
pub struct SeededStore {
    pub dir: TempDir,
    pub handle: DbHandle,
    pub catalog: AttributeCatalog,
}

impl SeededStore {
    pub fn connect(&self) -> Connection {
        self.handle.open().unwrap()
    }
}

pub fn fixture_source() -> StaticAttributeTypeSource {
    StaticAttributeTypeSource::from_payload(ATTRIBUTE_TYPES_JSON)
}

pub fn catalog_for(conn: &Connection) -> AttributeCatalog {
    let mut catalog = AttributeCatalog::default();
    catalog
        .ensure_loaded(conn, &fixture_source(), BASE_URL)
        .unwrap();
    catalog
}

pub fn empty_store() -> (TempDir, DbHandle) {
    let dir = tempfile::tempdir().unwrap();
    let handle = DbHandle::with_key(dir.path().join("fieldcare.db"), "test-key");
    (dir, handle)
}

pub fn seeded_store() -> SeededStore {
    let (dir, handle) = empty_store();
    let conn = handle.open().unwrap();
    let catalog = catalog_for(&conn);
    let ingestor = AttributeIngestor::default();

    let document: serde_json::Value = serde_json::from_str(PATIENT_JSON).unwrap();
    PatientImporter::new(&catalog, &ingestor)
        .import_json(&conn, &document)
        .unwrap();

    let second = Patient::with_id(SECOND_PATIENT_UUID, "GAN200077", "ram", "singh");
    SqlitePatientRepository::new(&conn)
        .create_patient(&second)
        .unwrap();
    SqliteAddressRepository::new(&conn)
        .set_preferred_address(
            SECOND_PATIENT_UUID,
            &PreferredAddress::new()
                .with_field("address2", "Bodri")
                .with_field("stateProvince", "Maharashtra"),
        )
        .unwrap();
    ingestor
        .ingest(
            &conn,
            SECOND_PATIENT_UUID,
            &[
                RawAttribute::new("education", json!("23")),
                RawAttribute::new("isUrban", json!(false)),
                RawAttribute::new("landHolding", json!(7)),
            ],
            &catalog,
        )
        .unwrap();

    SeededStore {
        dir,
        handle,
        catalog,
    }
}
