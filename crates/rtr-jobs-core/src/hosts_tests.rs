use super::*;
use serde_json::json;

fn ev(v: Value) -> LogEvent {
    match v {
        Value::Object(m) => m,
        _ => panic!("not an object"),
    }
}

#[test]
fn test_install_events() {
    let events = vec![
        ev(json!({
            "Device.GetDetails.Hostname": "web-2",
            "RTR.PutAndRun.Stdout": "installed",
        })),
        ev(json!({
            "device.getdetails.hostname": " web-1 ",
            "rtr.putandrun.stderr": "access denied",
            "rtr.putandrun.stdout": "partial",
        })),
    ];
    let hosts = extract_hosts(&events);
    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[0].host_name, "web-1");
    assert_eq!(hosts[0].status, "failed");
    assert_eq!(hosts[1].host_name, "web-2");
    assert_eq!(hosts[1].status, "completed");
    assert!(hosts.iter().all(|h| h.device_id.is_empty()));
}

#[test]
fn test_last_event_wins_per_host() {
    let events = vec![
        ev(json!({
            "x.device.getdetails.hostname": "db-1",
            "x.rtr.putandrun.stdout": "ok",
        })),
        ev(json!({
            "x.device.getdetails.hostname": "db-1",
            "x.rtr.putandrun.stderr": "boom",
        })),
    ];
    let hosts = extract_hosts(&events);
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].status, "failed");
}

#[test]
fn test_remove_events() {
    let events = vec![
        ev(json!({
            "device.getdetails.hostname": "a",
            "rtr.app_check_file_exist_rtr_2.file_exists": "true",
        })),
        ev(json!({
            "device.getdetails.hostname": "b",
            "rtr.app_check_file_exist_rtr_2.file_exists": "true",
            "rtr.app_remove_file_rtr_2.file_exists": "false",
        })),
        ev(json!({
            "device.getdetails.hostname": "c",
            "rtr.app_remove_file_rtr_2.response": "{\"file_exists\": true}",
        })),
        ev(json!({
            "device.getdetails.hostname": "d",
            "rtr.app_remove_file_rtr_2.response": "{\"file_exists\": \"false\"}",
        })),
    ];
    let hosts = extract_hosts(&events);
    let statuses: Vec<_> = hosts
        .iter()
        .map(|h| (h.host_name.as_str(), h.status.as_str()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("a", "completed"),
            ("b", "failed"),
            ("c", "completed"),
            ("d", "failed"),
        ]
    );
}

#[test]
fn test_dropped_events() {
    let events = vec![
        // No hostname.
        ev(json!({"rtr.putandrun.stdout": "ok"})),
        // Neither install nor remove output.
        ev(json!({"device.getdetails.hostname": "a"})),
        // Unknown truth value.
        ev(json!({
            "device.getdetails.hostname": "b",
            "rtr.app_remove_file_rtr_2.response": "{\"file_exists\": \"maybe\"}",
        })),
        // Unparseable response.
        ev(json!({
            "device.getdetails.hostname": "c",
            "rtr.app_check_file_exist_rtr_2.file_exists": "true",
            "rtr.app_remove_file_rtr_2.response": "not json",
        })),
        // Non-boolean flag.
        ev(json!({
            "device.getdetails.hostname": "d",
            "rtr.app_check_file_exist_rtr_2.file_exists": "yes",
        })),
    ];
    assert!(extract_hosts(&events).is_empty());
    assert!(extract_hosts(&[]).is_empty());
}
