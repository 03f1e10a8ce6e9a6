use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;

use shared_models::Role;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-signing-must-be-long-enough";

pub struct TestUser {
    pub email: String,
    pub role: Role,
    pub profile_id: i64,
    pub doctor_id: Option<i64>,
    pub staff_id: Option<i64>,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            email: email.to_string(),
            role,
            profile_id: 100,
            doctor_id: None,
            staff_id: None,
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn doctor(email: &str, doctor_id: i64) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..Self::new(email, Role::Doctor)
        }
    }

    pub fn staff(email: &str, staff_id: i64) -> Self {
        Self {
            staff_id: Some(staff_id),
            ..Self::new(email, Role::Staff)
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.email,
            "role": user.role,
            "profileId": user.profile_id,
            "doctorId": user.doctor_id,
            "staffId": user.staff_id,
            "email": user.email,
            "username": user.email.split('@').next().unwrap_or_default(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned bodies shaped like the clinic backend's queue endpoints.
pub struct MockBackendResponses;

impl MockBackendResponses {
    pub fn schedules_response(ids: &[i64]) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                json!({
                    "scheduleId": id,
                    "date": format!("2025-06-{:02}", i + 1),
                    "startTime": "09:00:00",
                    "endTime": "12:00:00"
                })
            })
            .collect();
        json!(rows)
    }

    pub fn waiting_list_response(entries: &[(u32, &str)]) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|(number, name)| {
                json!({
                    "queueNumber": number,
                    "status": "QUEUED",
                    "appointment": {
                        "appointmentId": 1000 + i64::from(*number),
                        "patient": { "profileName": name, "profileEmail": null }
                    }
                })
            })
            .collect();
        json!(rows)
    }

    pub fn appointment_queue_response(queue_number: u32, doctor_id: i64, current_queue: Option<i64>) -> serde_json::Value {
        json!({
            "queueNumber": queue_number,
            "doctorId": doctor_id,
            "currentQueue": current_queue,
            "doctorName": "Dr. Perera",
            "patientName": "Test Patient",
            "appointmentDateTime": "2025-06-01 09:00"
        })
    }

    pub fn queue_update_payload(doctor_id: i64, current_queue_number: i64) -> serde_json::Value {
        json!({
            "doctorId": doctor_id,
            "currentQueueNumber": current_queue_number,
            "message": if current_queue_number == -1 { "Queue is empty" } else { "Next patient please" }
        })
    }
}
