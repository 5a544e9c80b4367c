mod common;

use common::{catalog_for, FIXTURE_PATIENT_UUID, PATIENT_JSON};
use fieldcare_core::db::open_db_in_memory;
use fieldcare_core::repo::address_repo::{AddressRepository, SqliteAddressRepository};
use fieldcare_core::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use fieldcare_core::repo::patient_repo::{PatientRepository, SqlitePatientRepository};
use fieldcare_core::{
    AttributeIngestor, ImportError, IngestionError, Patient, PatientImporter, PreferredAddress,
    RepoError,
};
use serde_json::json;

#[test]
fn patient_crud_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePatientRepository::new(&conn);
    let mut patient = Patient::new("GAN400001", "sita", "bai");

    repo.create_patient(&patient).unwrap();
    assert_eq!(repo.get_patient(&patient.uuid).unwrap(), Some(patient.clone()));

    patient.family_name = "kumari".to_string();
    repo.update_patient(&patient).unwrap();
    assert_eq!(
        repo.get_patient(&patient.uuid).unwrap().unwrap().family_name,
        "kumari"
    );

    repo.delete_patient(&patient.uuid).unwrap();
    assert_eq!(repo.get_patient(&patient.uuid).unwrap(), None);
    assert!(matches!(
        repo.delete_patient(&patient.uuid),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn blank_identifier_is_rejected_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let patient = Patient::with_id("p-1", "", "a", "b");

    let err = SqlitePatientRepository::new(&conn)
        .create_patient(&patient)
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn preferred_address_is_replaced_not_duplicated() {
    let conn = open_db_in_memory().unwrap();
    let patient = Patient::new("GAN400002", "a", "b");
    SqlitePatientRepository::new(&conn)
        .create_patient(&patient)
        .unwrap();
    let addresses = SqliteAddressRepository::new(&conn);

    addresses
        .set_preferred_address(
            &patient.uuid,
            &PreferredAddress::new()
                .with_field("address2", "Ganiyari")
                .with_field("stateProvince", "Chattisgarh"),
        )
        .unwrap();
    addresses
        .set_preferred_address(
            &patient.uuid,
            &PreferredAddress::new().with_field("stateProvince", "Maharashtra"),
        )
        .unwrap();

    let stored = addresses.get_preferred_address(&patient.uuid).unwrap().unwrap();
    assert_eq!(stored.fields.len(), 1);
    assert_eq!(stored.get("stateProvince"), Some("Maharashtra"));
}

#[test]
fn address_for_unknown_patient_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let err = SqliteAddressRepository::new(&conn)
        .set_preferred_address("ghost", &PreferredAddress::new().with_field("address2", "x"))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == "ghost"));
}

#[test]
fn import_stores_patient_address_and_attributes() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog_for(&conn);
    let ingestor = AttributeIngestor::default();

    let id = PatientImporter::new(&catalog, &ingestor)
        .import_json(&conn, &serde_json::from_str(PATIENT_JSON).unwrap())
        .unwrap();
    assert_eq!(id, FIXTURE_PATIENT_UUID);

    let patient = SqlitePatientRepository::new(&conn)
        .get_patient(&id)
        .unwrap()
        .unwrap();
    assert_eq!(patient.identifier, "GAN200076");
    assert_eq!(patient.given_name, "test");

    let address = SqliteAddressRepository::new(&conn)
        .get_preferred_address(&id)
        .unwrap()
        .unwrap();
    assert_eq!(address.fields[0].name, "address1");
    assert_eq!(address.get("stateProvince"), Some("Chattisgarh"));
    assert_eq!(address.get("country"), None);

    let names: Vec<String> = SqliteAttributeRepository::new(&conn)
        .list_values_for_patient(&id)
        .unwrap()
        .into_iter()
        .map(|named| named.name)
        .collect();
    assert_eq!(
        names,
        vec!["caste", "class", "education", "isUrban", "landHolding"]
    );
}

#[test]
fn import_with_unknown_attribute_leaves_nothing_behind() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog_for(&conn);
    let ingestor = AttributeIngestor::default();
    let document = json!({
        "patient": {
            "uuid": "p-broken",
            "identifiers": [{"identifier": "GAN999"}],
            "person": {
                "names": [{"givenName": "x", "familyName": "y"}],
                "preferredAddress": {"address2": "Ganiyari"},
                "attributes": [{"attributeType": {"display": "religion"}, "value": "none"}]
            }
        }
    });

    let err = PatientImporter::new(&catalog, &ingestor)
        .import_json(&conn, &document)
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Ingestion(IngestionError::UnknownAttributeType(_))
    ));

    assert_eq!(
        SqlitePatientRepository::new(&conn)
            .get_patient("p-broken")
            .unwrap(),
        None
    );
    let address_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM patient_address_field;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(address_rows, 0);
}

#[test]
fn deleting_patient_cascades_to_address_and_attributes() {
    let conn = open_db_in_memory().unwrap();
    let catalog = catalog_for(&conn);
    let ingestor = AttributeIngestor::default();
    let id = PatientImporter::new(&catalog, &ingestor)
        .import_json(&conn, &serde_json::from_str(PATIENT_JSON).unwrap())
        .unwrap();

    SqlitePatientRepository::new(&conn).delete_patient(&id).unwrap();

    assert_eq!(
        SqliteAddressRepository::new(&conn)
            .get_preferred_address(&id)
            .unwrap(),
        None
    );
    assert!(SqliteAttributeRepository::new(&conn)
        .list_values_for_patient(&id)
        .unwrap()
        .is_empty());
}
