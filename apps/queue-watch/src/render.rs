use doctor_cell::DoctorQueueSnapshot;
use patient_cell::PatientQueueSnapshot;
use queue_sync_cell::{ConnectionState, SlotKind};

fn connection_tag(connection: ConnectionState, stale: bool) -> &'static str {
    match connection {
        ConnectionState::Connected => "live",
        _ if stale => "reconnecting",
        ConnectionState::Error => "offline",
        _ => "connecting",
    }
}

pub fn patient(snapshot: &PatientQueueSnapshot) -> String {
    let doctor = snapshot.doctor_name.as_deref().unwrap_or("your doctor");
    let mut window: Vec<String> = Vec::with_capacity(snapshot.window.len() + 1);
    let mut previous: Option<u32> = None;
    for slot in &snapshot.window {
        if previous.is_some_and(|prev| slot.position > prev + 1) {
            window.push("..".to_string());
        }
        previous = Some(slot.position);

        let number = slot.position.to_string();
        window.push(match (slot.kind, slot.is_viewer) {
            (SlotKind::Current, _) => format!("[{}]", number),
            (_, true) => format!("({})", number),
            (SlotKind::Completed, false) => format!("{}.", number),
            (SlotKind::Waiting, false) => number,
        });
    }

    format!(
        "[{}] {} | now {} | you {} | {}\n  {}",
        connection_tag(snapshot.connection, snapshot.stale),
        doctor,
        snapshot.counter_label(),
        snapshot.viewer_position,
        snapshot.status_message,
        window.join(" ")
    )
}

pub fn doctor(snapshot: &DoctorQueueSnapshot) -> String {
    let schedule = match snapshot.selected_schedule {
        Some(id) => snapshot
            .schedules
            .iter()
            .find(|schedule| schedule.schedule_id == id)
            .map(|schedule| schedule.label())
            .unwrap_or_else(|| format!("schedule {}", id)),
        None => "no schedule".to_string(),
    };

    let current = match (snapshot.counter, &snapshot.current_patient) {
        (Some(counter), Some(entry)) => format!("{} {}", counter, entry.patient_name()),
        (Some(counter), None) => counter.to_string(),
        (None, _) => "...".to_string(),
    };

    let waiting: Vec<String> = snapshot
        .waiting
        .iter()
        .map(|entry| format!("{} {}", entry.queue_number, entry.patient_name()))
        .collect();

    let action = if snapshot.completion_pending {
        "completing..."
    } else if snapshot.can_complete {
        "Enter = complete"
    } else {
        "complete unavailable"
    };

    let mut line = format!(
        "[{}] {} | now {} | waiting {} | {}",
        connection_tag(snapshot.connection, snapshot.stale),
        schedule,
        current,
        if waiting.is_empty() { "none".to_string() } else { waiting.join(", ") },
        action
    );
    if let Some(notice) = &snapshot.notice {
        line.push_str(&format!("\n  ! {} (d = dismiss)", notice));
    }
    line
}
