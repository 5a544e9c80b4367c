mod common;

use common::{seeded_store, SeededStore, FIXTURE_PATIENT_UUID, SECOND_PATIENT_UUID};
use fieldcare_core::search::executor::run_search;
use fieldcare_core::repo::address_repo::{AddressRepository, SqliteAddressRepository};
use fieldcare_core::search::result::MatchedField;
use fieldcare_core::PreferredAddress;
use fieldcare_core::{
    records_to_json, CancelToken, CompositionError, CoreConfig, DbHandle, QueryComposer,
    ResultRecord, SearchError, SearchExecutor, SearchMode, SearchParams, SubmitError,
};
use serde_json::{json, Value};
use std::sync::mpsc;
use tokio::runtime::{Builder, Runtime};

fn search(store: &SeededStore, request: Value) -> Vec<ResultRecord> {
    let runtime = Runtime::new().unwrap();
    let executor = SearchExecutor::new(store.handle.clone(), runtime.handle().clone());
    executor
        .submit_json(&request.to_string(), &QueryComposer::default())
        .unwrap()
        .wait()
        .unwrap()
}

fn attribute_request(value: Value) -> Value {
    json!({
        "q": "",
        "s": "byIdOrNameOrVillage",
        "startIndex": 0,
        "address_field_name": "address2",
        "address_field_value": "",
        "custom_attribute": value,
        "patientAttributes": ["caste", "isUrban", "education", "landHolding"]
    })
}

#[test]
fn search_by_first_name() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({"q": "test", "s": "byIdOrNameOrVillage", "startIndex": 0, "address_field_name": "address2"}),
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].given_name, "test");
    assert_eq!(results[0].address_field_value, Some(Some("Ganiyari".to_string())));
}

#[test]
fn search_by_last_name() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({"q": "integration", "s": "byIdOrNameOrVillage", "startIndex": 0, "address_field_name": "address2"}),
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].family_name, "integration");
}

#[test]
fn search_by_identifier() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({"q": "GAN200076", "s": "byIdOrNameOrVillage", "startIndex": 0, "address_field_name": "address2"}),
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "GAN200076");
}

#[test]
fn identifier_prefix_matches_in_identity_order() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({"q": "GAN2000", "s": "byIdOrNameOrVillage", "startIndex": 0}),
    );

    let identifiers: Vec<&str> = results.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["GAN200076", "GAN200077"]);
    assert!(results.iter().all(|r| r.address_field_value.is_none()));
}

#[test]
fn search_by_address() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({
            "q": "",
            "s": "byIdOrNameOrVillage",
            "startIndex": 0,
            "address_field_name": "stateProvince",
            "address_field_value": "Chattisgarh"
        }),
    );

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "GAN200076");
    assert_eq!(
        results[0].address_field_value,
        Some(Some("Chattisgarh".to_string()))
    );
}

#[test]
fn address_value_is_matched_verbatim() {
    let store = seeded_store();
    SqliteAddressRepository::new(&store.connect())
        .set_preferred_address(
            SECOND_PATIENT_UUID,
            &PreferredAddress::new().with_field("address2", "Bodri "),
        )
        .unwrap();
    let request = |value: &str| {
        json!({
            "q": "",
            "s": "byIdOrNameOrVillage",
            "address_field_name": "address2",
            "address_field_value": value
        })
    };

    let results = search(&store, request("Bodri "));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "GAN200077");
    assert_eq!(results[0].address_field_value, Some(Some("Bodri ".to_string())));

    assert!(search(&store, request("Bodri")).is_empty());
}

#[test]
fn query_is_matched_verbatim() {
    let store = seeded_store();
    let request = |q: &str| json!({"q": q, "s": "byIdOrNameOrVillage"});

    assert_eq!(search(&store, request("test")).len(), 1);
    assert!(search(&store, request(" test")).is_empty());
}

#[test]
fn search_by_text_attribute() {
    let store = seeded_store();

    let results = search(&store, attribute_request(json!("hindu")));
    assert_eq!(results.len(), 1);
    assert_eq!(
        Value::Object(results[0].custom_attribute.clone().unwrap()),
        json!({"caste": "hindu"})
    );

    let results = search(&store, attribute_request(json!("6th to 9th")));
    assert_eq!(results.len(), 1);
    assert_eq!(
        Value::Object(results[0].custom_attribute.clone().unwrap()),
        json!({"education": "6th to 9th"})
    );
}

#[test]
fn search_by_boolean_attribute() {
    let store = seeded_store();

    let results = search(&store, attribute_request(json!(true)));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "GAN200076");
    assert_eq!(
        Value::Object(results[0].custom_attribute.clone().unwrap()),
        json!({"isUrban": true})
    );

    let results = search(&store, attribute_request(json!(false)));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "GAN200077");
}

#[test]
fn numeric_attribute_never_matches_numeric_text() {
    let store = seeded_store();

    let numeric = search(&store, attribute_request(json!(23)));
    assert_eq!(numeric.len(), 1);
    assert_eq!(numeric[0].identifier, "GAN200076");
    let rendered = records_to_json(&numeric).unwrap();
    assert_eq!(rendered[0]["customAttribute"], json!({"landHolding": 23}));
    assert!(rendered[0]["customAttribute"]["landHolding"].is_number());

    let textual = search(&store, attribute_request(json!("23")));
    assert_eq!(textual.len(), 1);
    assert_eq!(textual[0].identifier, "GAN200077");
    assert_eq!(
        Value::Object(textual[0].custom_attribute.clone().unwrap()),
        json!({"education": "23"})
    );
}

#[test]
fn attribute_outside_candidates_does_not_match() {
    let store = seeded_store();
    let mut request = attribute_request(json!("General"));
    request["patientAttributes"] = json!(["caste", "education"]);

    assert!(search(&store, request).is_empty());
}

#[test]
fn families_combine_with_and() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({
            "q": "ram",
            "s": "byIdOrNameOrVillage",
            "address_field_name": "stateProvince",
            "address_field_value": "Chattisgarh"
        }),
    );
    assert!(results.is_empty());
}

#[test]
fn zero_matches_is_an_empty_success() {
    let store = seeded_store();
    let results = search(
        &store,
        json!({"q": "nobody", "s": "byIdOrNameOrVillage", "startIndex": 0}),
    );
    assert!(results.is_empty());
}

#[test]
fn start_index_pages_through_results() {
    let store = seeded_store();
    let conn = store.connect();
    let config = CoreConfig {
        page_size: 1,
        ..CoreConfig::default()
    };
    let composer = QueryComposer::from_config(&config);

    let mut params = SearchParams::new(SearchMode::ByIdOrNameOrVillage);
    let first = run_search(&conn, &composer.compose(&params).unwrap(), &CancelToken::new()).unwrap();
    params.start_index = 1;
    let second =
        run_search(&conn, &composer.compose(&params).unwrap(), &CancelToken::new()).unwrap();
    params.start_index = 2;
    let third = run_search(&conn, &composer.compose(&params).unwrap(), &CancelToken::new()).unwrap();

    assert_eq!(first[0].patient_id, FIXTURE_PATIENT_UUID);
    assert_eq!(second[0].patient_id, SECOND_PATIENT_UUID);
    assert!(third.is_empty());
}

#[test]
fn matched_clause_is_reported_first_match_wins() {
    let store = seeded_store();
    let conn = store.connect();
    let mut params = SearchParams::new(SearchMode::ByIdOrNameOrVillage);
    params.query = Some("integration".to_string());

    let rows = run_search(
        &conn,
        &QueryComposer::default().compose(&params).unwrap(),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(rows[0].matched_on, Some(MatchedField::FamilyName));
}

#[test]
fn cancelled_token_stops_the_search() {
    let store = seeded_store();
    let conn = store.connect();
    let token = CancelToken::new();
    token.cancel();

    let predicate = QueryComposer::default()
        .compose(&SearchParams::new(SearchMode::ByIdOrNameOrVillage))
        .unwrap();
    assert!(matches!(
        run_search(&conn, &predicate, &token),
        Err(SearchError::Cancelled)
    ));
}

#[test]
fn cancelling_a_queued_task_resolves_as_cancelled() {
    let store = seeded_store();
    let runtime = Builder::new_current_thread()
        .max_blocking_threads(1)
        .build()
        .unwrap();
    let (release, blocked) = mpsc::channel::<()>();
    runtime.spawn_blocking(move || blocked.recv());

    let executor = SearchExecutor::new(store.handle.clone(), runtime.handle().clone());
    let predicate = QueryComposer::default()
        .compose(&SearchParams::new(SearchMode::ByIdOrNameOrVillage))
        .unwrap();
    let task = executor.execute(predicate);
    task.cancel();
    release.send(()).unwrap();

    assert!(matches!(task.wait(), Err(SearchError::Cancelled)));
}

#[test]
fn worker_dropped_before_running_resolves_as_worker_failed() {
    let store = seeded_store();
    let runtime = Runtime::new().unwrap();
    let handle = runtime.handle().clone();
    runtime.shutdown_background();

    let executor = SearchExecutor::new(store.handle.clone(), handle);
    let predicate = QueryComposer::default()
        .compose(&SearchParams::new(SearchMode::ByIdOrNameOrVillage))
        .unwrap();

    assert!(matches!(
        executor.execute(predicate).wait(),
        Err(SearchError::WorkerFailed)
    ));
}

#[test]
fn invalid_composition_fails_before_storage() {
    let runtime = Runtime::new().unwrap();
    let executor = SearchExecutor::new(
        DbHandle::new("/nonexistent/fieldcare/store.db"),
        runtime.handle().clone(),
    );

    let err = executor
        .submit_json(
            &json!({"q": "", "s": "byIdOrNameOrVillage", "address_field_value": "Chattisgarh"})
                .to_string(),
            &QueryComposer::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Composition(CompositionError::InvalidParams(_))
    ));

    let err = executor
        .submit_json("{\"q\": 5}", &QueryComposer::default())
        .unwrap_err();
    assert!(matches!(err, SubmitError::Request(_)));
}

#[test]
fn storage_failure_resolves_the_task_with_an_error() {
    let runtime = Runtime::new().unwrap();
    let executor = SearchExecutor::new(
        DbHandle::new("/nonexistent/fieldcare/store.db"),
        runtime.handle().clone(),
    );
    let predicate = QueryComposer::default()
        .compose(&SearchParams::new(SearchMode::ByIdOrNameOrVillage))
        .unwrap();

    let result = executor.execute(predicate).wait();
    assert!(matches!(result, Err(SearchError::Storage(_))));
}

#[test]
fn searches_see_current_store_state() {
    let store = seeded_store();
    let request = json!({"q": "GAN200076", "s": "byIdOrNameOrVillage"});
    assert_eq!(search(&store, request.clone()).len(), 1);

    store
        .connect()
        .execute("DELETE FROM patient WHERE uuid = ?1;", [FIXTURE_PATIENT_UUID])
        .unwrap();
    assert!(search(&store, request).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_searches_resolve_independently() {
    let store = seeded_store();
    let executor = SearchExecutor::on_current_runtime(store.handle.clone()).unwrap();
    let composer = QueryComposer::default();

    let by_name = executor
        .submit_json(
            &json!({"q": "test", "s": "byIdOrNameOrVillage"}).to_string(),
            &composer,
        )
        .unwrap();
    let by_attribute = executor
        .submit_json(&attribute_request(json!(7)).to_string(), &composer)
        .unwrap();

    let (by_name, by_attribute) = tokio::join!(by_name, by_attribute);
    assert_eq!(by_name.unwrap()[0].identifier, "GAN200076");
    assert_eq!(
        Value::Object(by_attribute.unwrap()[0].custom_attribute.clone().unwrap()),
        json!({"landHolding": 7})
    );
}
