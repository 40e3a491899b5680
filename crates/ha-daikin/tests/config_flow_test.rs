//! Config flow tests

mod common;

use common::*;
use daikin_api::DaikinError;
use ha_daikin::config_flow::{
    ABORT_ALREADY_CONFIGURED, ERROR_API_PASSWORD, ERROR_CANNOT_CONNECT, ERROR_UNKNOWN, STEP_USER,
};
use ha_daikin::{ConfigEntrySource, ConfigEntryState, FlowError, FlowInit, FlowStep, DOMAIN};
use serde_json::{json, Value};

fn host_default(step: &FlowStep) -> Option<Value> {
    match step {
        FlowStep::Form { data_schema, .. } => data_schema
            .iter()
            .find(|f| f.name == "host")
            .and_then(|f| f.default.clone()),
        _ => panic!("expected a form, got {:?}", step),
    }
}

#[tokio::test]
async fn test_user_step_shows_form() {
    let hass = test_hass(MockConnector::new().into_arc());

    let result = hass.flow_init(FlowInit::User(None)).await.unwrap();

    let FlowStep::Form {
        step_id,
        data_schema,
        errors,
    } = &result.step
    else {
        panic!("expected a form, got {:?}", result.step);
    };
    assert_eq!(step_id, STEP_USER);
    assert_eq!(errors, &None);
    let names: Vec<_> = data_schema.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["host", "api_key", "password"]);
    assert_eq!(data_schema[0].required, Some(true));
    assert_eq!(data_schema[1].required, Some(false));
    assert_eq!(result.handler, DOMAIN);
    assert_eq!(hass.flows().in_progress(), vec![result.flow_id.clone()]);
}

#[tokio::test]
async fn test_api_key_and_password_are_exclusive() {
    let unit = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let connector = MockConnector::new().with_unit("10.0.0.5", unit).into_arc();
    let hass = test_hass(connector.clone());

    let form = hass.flow_init(FlowInit::User(None)).await.unwrap();
    let result = hass
        .flow_configure(
            &form.flow_id,
            flow_input(&[("host", "10.0.0.5"), ("api_key", "k"), ("password", "p")]),
        )
        .await
        .unwrap();

    assert_eq!(result.step.base_error(), Some(ERROR_API_PASSWORD));
    assert_eq!(host_default(&result.step), Some(json!("10.0.0.5")));
    assert_eq!(connector.attempt_count(), 0);

    // The flow stays open for a corrected submission
    let result = hass
        .flow_configure(&form.flow_id, host_input("10.0.0.5"))
        .await
        .unwrap();
    assert!(matches!(result.step, FlowStep::CreateEntry { .. }));
    assert!(hass.flows().in_progress().is_empty());
}

#[tokio::test]
async fn test_api_key_generates_uuid() {
    let unit = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let connector = MockConnector::new().with_unit("10.0.0.5", unit).into_arc();
    let hass = test_hass(connector.clone());

    let result = hass
        .flow_init(FlowInit::User(Some(flow_input(&[
            ("host", "10.0.0.5"),
            ("api_key", "0123456789abcdef"),
        ]))))
        .await
        .unwrap();

    let FlowStep::CreateEntry {
        title,
        data,
        version,
    } = &result.step
    else {
        panic!("expected create_entry, got {:?}", result.step);
    };
    assert_eq!(title, "10.0.0.5");
    assert_eq!(*version, 1);
    assert_eq!(data["host"], json!("10.0.0.5"));
    assert_eq!(data["mac"], json!("aabbccddeeff"));
    assert_eq!(data["api_key"], json!("0123456789abcdef"));
    assert_eq!(data["password"], Value::Null);

    let generated = data["uuid"].as_str().unwrap();
    let parsed = uuid::Uuid::parse_str(generated).unwrap();
    assert_eq!(parsed.get_version_num(), 4);

    let first = &connector.attempts()[0];
    assert_eq!(first.key.as_deref(), Some("0123456789abcdef"));
    assert_eq!(first.uuid.as_deref(), Some(generated));
}

#[tokio::test]
async fn test_created_entry_is_set_up() {
    let unit = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let connector = MockConnector::new().with_unit("10.0.0.5", unit).into_arc();
    let hass = test_hass(connector);

    let result = hass
        .flow_init(FlowInit::User(Some(host_input("10.0.0.5"))))
        .await
        .unwrap();

    let entry_id = result.entry_id.expect("entry id");
    let entry = hass.config_entries().get(&entry_id).unwrap();
    assert_eq!(entry.unique_id.as_deref(), Some("aabbccddeeff"));
    assert_eq!(entry.source, ConfigEntrySource::User);
    assert_eq!(entry.state, ConfigEntryState::Loaded);
    assert!(hass.client(&entry_id).is_some());
    assert_state(&hass, "climate.office_climate", "off");
}

#[tokio::test]
async fn test_empty_password_is_treated_as_absent() {
    let unit = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let connector = MockConnector::new().with_unit("10.0.0.5", unit).into_arc();
    let hass = test_hass(connector.clone());

    let result = hass
        .flow_init(FlowInit::User(Some(flow_input(&[
            ("host", "10.0.0.5"),
            ("api_key", ""),
            ("password", ""),
        ]))))
        .await
        .unwrap();

    let FlowStep::CreateEntry { data, .. } = &result.step else {
        panic!("expected create_entry, got {:?}", result.step);
    };
    assert_eq!(data["password"], Value::Null);
    assert_eq!(data["api_key"], Value::Null);
    assert_eq!(data["uuid"], Value::Null);

    let first = &connector.attempts()[0];
    assert_eq!(first.password, None);
    assert_eq!(first.key, None);
}

#[tokio::test]
async fn test_password_is_passed_through() {
    let unit = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let connector = MockConnector::new().with_unit("10.0.0.5", unit).into_arc();
    let hass = test_hass(connector.clone());

    let result = hass
        .flow_init(FlowInit::User(Some(flow_input(&[
            ("host", "10.0.0.5"),
            ("password", "skyfi"),
        ]))))
        .await
        .unwrap();

    let FlowStep::CreateEntry { data, .. } = &result.step else {
        panic!("expected create_entry, got {:?}", result.step);
    };
    assert_eq!(data["password"], json!("skyfi"));
    assert_eq!(data["uuid"], Value::Null);
    assert_eq!(connector.attempts()[0].password.as_deref(), Some("skyfi"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_shows_cannot_connect_and_forgets_host() {
    let connector = MockConnector::new().with_hang("10.0.0.9").into_arc();
    let hass = test_hass(connector);

    let form = hass.flow_init(FlowInit::User(None)).await.unwrap();

    // Remember a host first through the conflict error
    let result = hass
        .flow_configure(
            &form.flow_id,
            flow_input(&[("host", "10.0.0.9"), ("api_key", "k"), ("password", "p")]),
        )
        .await
        .unwrap();
    assert_eq!(host_default(&result.step), Some(json!("10.0.0.9")));

    let result = hass
        .flow_configure(&form.flow_id, host_input("10.0.0.9"))
        .await
        .unwrap();

    assert_eq!(result.step.base_error(), Some(ERROR_CANNOT_CONNECT));
    assert_eq!(host_default(&result.step), None);
    assert!(hass.config_entries().is_empty());
}

#[tokio::test]
async fn test_connect_error_shows_unknown() {
    let connector = MockConnector::new()
        .with_failure("10.0.0.5", DaikinError::Auth("bad key".to_string()))
        .into_arc();
    let hass = test_hass(connector);

    let form = hass.flow_init(FlowInit::User(None)).await.unwrap();
    let result = hass
        .flow_configure(&form.flow_id, host_input("10.0.0.5"))
        .await
        .unwrap();

    assert_eq!(result.step.base_error(), Some(ERROR_UNKNOWN));
    assert!(matches!(&result.step, FlowStep::Form { step_id, .. } if step_id == STEP_USER));
    // The flow stays open after a failed attempt
    assert_eq!(hass.flows().in_progress(), vec![form.flow_id]);
}

#[tokio::test]
async fn test_same_unit_aborts_already_configured() {
    let unit = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let connector = MockConnector::new()
        .with_unit("10.0.0.5", unit.clone())
        .with_unit("office.local", unit)
        .into_arc();
    let hass = test_hass(connector);

    setup_unit(&hass, "10.0.0.5", "aabbccddeeff").await;

    let result = hass
        .flow_init(FlowInit::User(Some(host_input("office.local"))))
        .await
        .unwrap();

    assert_eq!(
        result.step,
        FlowStep::Abort {
            reason: ABORT_ALREADY_CONFIGURED.to_string()
        }
    );
    assert_eq!(result.entry_id, None);
    assert_eq!(hass.config_entries().len(), 1);
}

#[tokio::test]
async fn test_missing_host_is_rejected() {
    let hass = test_hass(MockConnector::new().into_arc());

    let form = hass.flow_init(FlowInit::User(None)).await.unwrap();
    let result = hass
        .flow_configure(&form.flow_id, flow_input(&[("api_key", "k")]))
        .await;

    assert!(matches!(result, Err(FlowError::MissingField("host"))));
    // The flow is kept so the form can be resubmitted
    assert_eq!(hass.flows().in_progress(), vec![form.flow_id]);
}

#[tokio::test]
async fn test_unknown_flow() {
    let hass = test_hass(MockConnector::new().into_arc());

    let result = hass.flow_configure("01HNOPE", host_input("10.0.0.5")).await;
    assert!(matches!(result, Err(FlowError::UnknownFlow(_))));
    assert!(hass.flows().abort("01HNOPE").is_err());
}

#[tokio::test]
async fn test_yaml_import_creates_entries() {
    let office = MockDaikin::new("aabbccddeeff", "Office").into_arc();
    let bedroom = MockDaikin::new("112233445566", "Bedroom").into_arc();
    let connector = MockConnector::new()
        .with_unit("10.0.0.5", office)
        .with_unit("10.0.0.6", bedroom)
        .into_arc();
    let hass = test_hass(connector);

    let yaml: serde_yaml::Value = serde_yaml::from_str(
        r#"
custom_daikin:
  - host: 10.0.0.5
  - host: 10.0.0.6
    api_key: "0123"
  - host: 10.0.0.7
    api_key: "0123"
    password: "secret"
  - host: 10.0.0.8
"#,
    )
    .unwrap();

    assert!(ha_daikin::async_setup(&hass, &yaml).await.unwrap());

    let mut entries = hass.config_entries().get_by_domain(DOMAIN);
    entries.sort_by(|a, b| a.title.cmp(&b.title));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].title, "10.0.0.5");
    assert_eq!(entries[1].title, "10.0.0.6");
    assert!(entries.iter().all(|e| e.source == ConfigEntrySource::Import));
    assert!(entries.iter().all(|e| e.is_loaded()));

    // Neither the conflicting nor the unreachable unit leaves a flow behind
    assert!(hass.flows().in_progress().is_empty());
    assert!(ha_daikin::async_setup(&hass, &yaml).await.unwrap());
    assert!(hass.flows().in_progress().is_empty());
    assert_eq!(hass.config_entries().len(), 2);
}

#[tokio::test]
async fn test_failed_import_aborts_with_error() {
    let hass = test_hass(
        MockConnector::new()
            .with_failure("10.0.0.5", DaikinError::Connection("refused".to_string()))
            .into_arc(),
    );

    let result = hass
        .flow_init(FlowInit::Import(host_input("10.0.0.5")))
        .await
        .unwrap();

    assert_eq!(
        result.step,
        FlowStep::Abort {
            reason: ERROR_UNKNOWN.to_string()
        }
    );
    assert!(hass.flows().in_progress().is_empty());
}

#[tokio::test]
async fn test_client_timeout_shows_cannot_connect() {
    let connector = MockConnector::new()
        .with_failure("10.0.0.5", DaikinError::Timeout)
        .into_arc();
    let hass = test_hass(connector);

    let result = hass
        .flow_init(FlowInit::User(Some(host_input("10.0.0.5"))))
        .await
        .unwrap();

    assert_eq!(result.step.base_error(), Some(ERROR_CANNOT_CONNECT));
    assert_eq!(host_default(&result.step), None);
}

#[tokio::test]
async fn test_setup_without_domain_block() {
    let hass = test_hass(MockConnector::new().into_arc());
    let yaml: serde_yaml::Value = serde_yaml::from_str("homeassistant: {}\n").unwrap();

    assert!(ha_daikin::async_setup(&hass, &yaml).await.unwrap());
    assert!(hass.config_entries().is_empty());
}
