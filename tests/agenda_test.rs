//! Agenda model tests: creation with QR tokens, creator-only mutation,
//! cascade delete and attendance export.

mod common;

use common::*;
use ormawa::errors::AppError;
use ormawa::models::agenda::{self, AgendaCreateRequest, AgendaType, AgendaUpdateRequest};
use ormawa::models::attendance;
use ormawa::models::user::Role;
use regex::Regex;

#[tokio::test]
async fn test_create_agenda_assigns_qr_token_and_creator() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;

    let created = create_agenda(pool, &officer, "Rapat Pleno", "2025-01-01T09:00", "2025-01-01T11:00").await;

    let token = Regex::new(r"^AGENDA-[A-Za-z0-9]{8}$").unwrap();
    assert!(token.is_match(&created.qr_code), "unexpected token {}", created.qr_code);
    assert_eq!(created.user_id, officer.user_id);
    assert_eq!(created.agenda_type, AgendaType::Semua);
    assert_eq!(created.start_time, at("2025-01-01T09:00"));
}

#[tokio::test]
async fn test_qr_tokens_are_unique_across_agendas() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;

    let mut seen = std::collections::HashSet::new();
    for i in 0..20 {
        let a = create_agenda(pool, &officer, &format!("Agenda {i}"), "2025-01-01T09:00", "2025-01-01T10:00").await;
        assert!(seen.insert(a.qr_code));
    }
}

#[tokio::test]
async fn test_members_cannot_see_officer_agendas_in_list() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;
    let member = create_user(pool, "anggota1", Role::Anggota).await;

    create_agenda(pool, &officer, "Kajian Umum", "2025-01-01T09:00", "2025-01-01T10:00").await;
    let internal = AgendaCreateRequest {
        title: "Rapat Internal".to_string(),
        description: Some("Khusus pengurus".to_string()),
        start_time: "2025-01-02T09:00".to_string(),
        end_time: "2025-01-02T10:00".to_string(),
        agenda_type: Some("pengurus".to_string()),
    }
    .validate()
    .unwrap();
    agenda::create(pool, &officer, &internal).await.unwrap();

    let for_officer = agenda::find_all(pool, &officer).await.unwrap();
    assert_eq!(for_officer.len(), 2);
    // Newest start time first
    assert_eq!(for_officer[0].agenda.title, "Rapat Internal");

    let for_member = agenda::find_all(pool, &member).await.unwrap();
    assert_eq!(for_member.len(), 1);
    assert_eq!(for_member[0].agenda.title, "Kajian Umum");
}

#[tokio::test]
async fn test_update_is_partial_and_keeps_qr_token() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;
    let created = create_agenda(pool, &officer, "Rapat", "2025-01-01T09:00", "2025-01-01T11:00").await;

    let patch = AgendaUpdateRequest { title: Some("Rapat Evaluasi".to_string()), ..Default::default() }
        .validate()
        .unwrap();
    let updated = agenda::update(pool, created.id, patch, &officer).await.unwrap();

    assert_eq!(updated.title, "Rapat Evaluasi");
    assert_eq!(updated.qr_code, created.qr_code);
    assert_eq!(updated.start_time, created.start_time);
    assert_eq!(updated.end_time, created.end_time);
}

#[tokio::test]
async fn test_update_rejects_end_before_start() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;
    let created = create_agenda(pool, &officer, "Rapat", "2025-01-01T09:00", "2025-01-01T11:00").await;

    let patch = AgendaUpdateRequest { end_time: Some("2025-01-01T08:00".to_string()), ..Default::default() }
        .validate()
        .unwrap();
    let err = agenda::update(pool, created.id, patch, &officer).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_non_creator_cannot_update_or_delete() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let owner = create_user(pool, "pengurus1", Role::Pengurus).await;
    let other_officer = create_user(pool, "pengurus2", Role::Pengurus).await;
    let admin = create_user(pool, "admin1", Role::Admin).await;
    let created = create_agenda(pool, &owner, "Rapat", "2025-01-01T09:00", "2025-01-01T11:00").await;

    for requester in [&other_officer, &admin] {
        let patch = AgendaUpdateRequest { title: Some("Diambil alih".to_string()), ..Default::default() }
            .validate()
            .unwrap();
        let err = agenda::update(pool, created.id, patch, requester).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let err = agenda::delete(pool, created.id, requester).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    let still_there = agenda::find_by_id(pool, created.id).await.unwrap().unwrap();
    assert_eq!(still_there.title, "Rapat");
}

#[tokio::test]
async fn test_update_missing_agenda_is_not_found() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;

    let err = agenda::update(pool, 9999, Default::default(), &officer).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Agenda")));
}

#[tokio::test]
async fn test_delete_cascades_to_attendances() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;
    let member = create_user(pool, "anggota1", Role::Anggota).await;
    let created = create_agenda(pool, &officer, "Rapat", "2025-01-01T09:00", "2025-01-01T11:00").await;

    attendance::manual_input(pool, created.id, member.user_id, &officer, at("2025-01-01T09:30"))
        .await
        .unwrap();

    let removed = agenda::delete(pool, created.id, &officer).await.unwrap();
    assert_eq!(removed, 1);
    assert!(agenda::find_by_id(pool, created.id).await.unwrap().is_none());

    let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendances")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn test_export_has_header_and_one_indexed_rows() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;
    let first = create_user_with(pool, "anggota1", Role::Anggota, Some("2101001"), Some("Staf")).await;
    let second = create_user_with(pool, "anggota2", Role::Anggota, None, None).await;
    let created = create_agenda(pool, &officer, "Rapat", "2025-01-01T09:00", "2025-01-01T11:00").await;

    attendance::scan(pool, &created.qr_code, &first, at("2025-01-01T08:50")).await.unwrap();
    attendance::scan(pool, &created.qr_code, &second, at("2025-01-01T09:05")).await.unwrap();

    let (found, csv) = agenda::export_attendance_csv(pool, created.id).await.unwrap();
    assert_eq!(agenda::export_filename(&found), format!("absensi-{}.csv", created.id));

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "No,NIM,Nama,Jabatan,Waktu Scan");
    assert_eq!(lines[1], "1,2101001,Nama anggota1,Staf,01-01-2025 08:50:00");
    assert_eq!(lines[2], "2,-,Nama anggota2,-,01-01-2025 09:05:00");
}

#[tokio::test]
async fn test_export_missing_agenda_is_not_found() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let err = agenda::export_attendance_csv(pool, 4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_detail_lists_attendances_in_scan_order() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let officer = create_user(pool, "pengurus1", Role::Pengurus).await;
    let a = create_user(pool, "anggota1", Role::Anggota).await;
    let b = create_user(pool, "anggota2", Role::Anggota).await;
    let created = create_agenda(pool, &officer, "Rapat", "2025-01-01T09:00", "2025-01-01T11:00").await;

    attendance::scan(pool, &created.qr_code, &b, at("2025-01-01T09:00")).await.unwrap();
    attendance::scan(pool, &created.qr_code, &a, at("2025-01-01T09:10")).await.unwrap();

    let detail = agenda::find_detail(pool, created.id).await.unwrap().unwrap();
    assert_eq!(detail.creator_name, "Nama pengurus1");
    let order: Vec<i64> = detail.attendances.iter().map(|e| e.user_id).collect();
    assert_eq!(order, vec![b.user_id, a.user_id]);

    let listed = agenda::find_all(pool, &officer).await.unwrap();
    assert_eq!(listed[0].attendance_count, 2);
}
