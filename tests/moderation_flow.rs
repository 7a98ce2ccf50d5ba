mod common;

use common::{Harness, MODERATOR};
use spotwarden::{SpotStatus, SpotSubmission, SpotwardenError, SubmissionError};

fn ids(h: &Harness) -> Vec<u64> {
    h.service.list_spots().unwrap().iter().map(|s| s.id).collect()
}

#[test]
fn test_submit_approve_roundtrip() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.submit(&author, "Old mill");

    assert!(ids(&h).is_empty());
    let pending = h.service.pending_spots(MODERATOR).unwrap();
    assert_eq!(pending[0].id, spot);
    assert_eq!(pending[0].status, SpotStatus::Pending);

    let approve = h.button(spot, "Approve");
    let outcome = h.service.handle_moderator_action(MODERATOR, &approve).unwrap();
    assert_eq!(outcome.bonus_credited, Some(40));

    assert_eq!(ids(&h), vec![spot]);
    let listed = &h.service.list_spots().unwrap()[0];
    assert_eq!(listed.author_handle, "@author");
    assert_eq!(h.service.get_profile(&author).unwrap().balance, 40);

    let author_notices = h.inbox.to(author.user_id);
    assert_eq!(author_notices.len(), 1);
    assert!(author_notices[0].text.contains("approved"));
}

#[test]
fn test_submit_reject_roundtrip() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.submit(&author, "Old mill");

    let reject = h.button(spot, "Reject");
    let outcome = h.service.handle_moderator_action(MODERATOR, &reject).unwrap();
    assert_eq!(outcome.status, SpotStatus::Rejected);

    assert!(ids(&h).is_empty());
    assert_eq!(h.service.get_profile(&author).unwrap().balance, 0);

    let own = h.service.own_spots(&author).unwrap();
    assert_eq!(own[0].status, SpotStatus::Rejected);
    assert!(h.inbox.to(author.user_id)[0].text.contains("rejected"));
}

#[test]
fn test_stale_taps_do_not_recredit() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.submit(&author, "Quarry");
    let approve = h.button(spot, "Approve");
    let reject = h.button(spot, "Reject");

    h.service.handle_moderator_action(MODERATOR, &approve).unwrap();
    for token in [&approve, &reject] {
        assert!(matches!(
            h.service.handle_moderator_action(MODERATOR, token),
            Err(SpotwardenError::AlreadyModerated {
                status: SpotStatus::Approved,
                ..
            })
        ));
    }
    assert!(matches!(
        h.service.approve_spot(MODERATOR, spot),
        Err(SpotwardenError::AlreadyModerated { .. })
    ));
    assert_eq!(h.service.get_profile(&author).unwrap().balance, 40);
}

#[test]
fn test_approve_after_reject_refused() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.submit(&author, "Quarry");
    h.service.reject_spot(MODERATOR, spot).unwrap();

    assert!(matches!(
        h.service.approve_spot(MODERATOR, spot),
        Err(SpotwardenError::AlreadyModerated {
            status: SpotStatus::Rejected,
            ..
        })
    ));
    assert_eq!(h.service.get_profile(&author).unwrap().balance, 0);
    assert!(ids(&h).is_empty());
}

#[test]
fn test_tokens_bound_to_their_spot() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let first = h.submit(&author, "First");
    let second = h.submit(&author, "Second");

    let approve_first = h.button(first, "Approve");
    let forged = approve_first.replacen(&format!(":{}:", first), &format!(":{}:", second), 1);
    assert!(matches!(
        h.service.handle_moderator_action(MODERATOR, &forged),
        Err(SpotwardenError::InvalidActionToken)
    ));
    assert_eq!(h.service.pending_spots(MODERATOR).unwrap().len(), 2);
}

#[test]
fn test_only_moderator_moderates() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.submit(&author, "Hangar");
    let approve = h.button(spot, "Approve");

    assert!(matches!(
        h.service.handle_moderator_action(author.user_id, &approve),
        Err(SpotwardenError::NotModerator)
    ));
    assert!(matches!(
        h.service.approve_spot(author.user_id, spot),
        Err(SpotwardenError::NotModerator)
    ));
    assert!(matches!(
        h.service.pending_spots(author.user_id),
        Err(SpotwardenError::NotModerator)
    ));
    assert!(matches!(
        h.service.set_spot_active(author.user_id, spot, false),
        Err(SpotwardenError::NotModerator)
    ));
}

#[test]
fn test_out_of_range_submission_never_pending() {
    let h = Harness::new();
    let author = h.login(1, "author");

    let err = h
        .service
        .submit_spot(
            &author,
            SpotSubmission {
                title: "Nowhere".into(),
                lat: 200.0,
                lon: 0.0,
                unlock_target: "https://telegra.ph/nowhere".into(),
                danger: None,
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        SpotwardenError::InvalidSubmission(SubmissionError::CoordinatesOutOfRange { .. })
    ));
    assert!(h.service.pending_spots(MODERATOR).unwrap().is_empty());
    assert!(h.service.get_profile(&author).unwrap().owned_spot_ids.is_empty());
    assert!(h.inbox.sent().is_empty());
}

#[test]
fn test_unlock_host_enforced() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let err = h
        .service
        .submit_spot(
            &author,
            SpotSubmission {
                title: "Elsewhere".into(),
                lat: 1.0,
                lon: 1.0,
                unlock_target: "https://example.com/doc".into(),
                danger: None,
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SpotwardenError::InvalidSubmission(SubmissionError::InvalidUnlockTarget { .. })
    ));
}

#[test]
fn test_owned_spots_tracked_in_profile() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let a = h.submit(&author, "A");
    let b = h.submit(&author, "B");

    let profile = h.service.get_profile(&author).unwrap();
    assert_eq!(profile.owned_spot_ids.into_iter().collect::<Vec<_>>(), vec![a, b]);
}

#[test]
fn test_listing_toggle() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.approved_spot(&author, "Lighthouse");

    let detail = h.service.set_spot_active(MODERATOR, spot, false).unwrap();
    assert!(!detail.active);
    assert!(ids(&h).is_empty());

    h.service.set_spot_active(MODERATOR, spot, true).unwrap();
    assert_eq!(ids(&h), vec![spot]);
}

#[test]
fn test_notice_outage_is_recovered() {
    let h = Harness::new();
    let author = h.login(1, "author");
    h.inbox.set_down(true);

    let spot = h.submit(&author, "Bunker");
    h.service.approve_spot(MODERATOR, spot).unwrap();
    assert_eq!(h.service.pending_notifications().unwrap(), 2);
    assert!(h.inbox.sent().is_empty());

    h.inbox.set_down(false);
    let report = h.service.flush_notifications().unwrap();
    assert_eq!((report.delivered, report.pending), (2, 0));
    assert_eq!(h.inbox.to(MODERATOR).len(), 1);
    assert_eq!(h.inbox.to(author.user_id).len(), 1);
}

#[test]
fn test_outbox_gives_up_after_attempt_limit() {
    let h = Harness::with_config(|c| c.max_notify_attempts = 3);
    let author = h.login(1, "author");
    h.inbox.set_down(true);
    for i in 0..20 {
        h.submit(&author, &format!("Spot {}", i));
    }
    assert_eq!(h.service.pending_notifications().unwrap(), 20);

    h.service.flush_notifications().unwrap();
    let report = h.service.flush_notifications().unwrap();
    assert_eq!((report.dropped, report.pending), (20, 0));
    assert_eq!(h.service.pending_notifications().unwrap(), 0);

    h.inbox.set_down(false);
    assert_eq!(h.service.flush_notifications().unwrap().delivered, 0);
    assert!(h.inbox.sent().is_empty());
}

#[test]
fn test_blocked_author_notice_not_queued() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let spot = h.submit(&author, "Roof");
    h.inbox.block(author.user_id);

    h.service.approve_spot(MODERATOR, spot).unwrap();
    assert_eq!(h.service.pending_notifications().unwrap(), 0);
    assert_eq!(h.service.get_profile(&author).unwrap().balance, 40);
}

#[test]
fn test_price_fixed_at_submission() {
    let h = Harness::with_config(|c| c.spot_price = 35);
    let author = h.login(1, "author");
    h.submit(&author, "Pricey");
    assert_eq!(h.service.own_spots(&author).unwrap()[0].price, 35);
    assert_eq!(h.service.config().spot_price, 35);
}

#[test]
fn test_danger_tag_reaches_moderator_and_map() {
    let h = Harness::new();
    let author = h.login(1, "author");
    let submit = |title: &str, danger: Option<&str>| {
        h.service
            .submit_spot(
                &author,
                SpotSubmission {
                    title: title.into(),
                    lat: 10.0,
                    lon: 20.0,
                    unlock_target: "telegra.ph/roof".into(),
                    danger: danger.map(str::to_string),
                },
            )
            .unwrap()
            .spot_id
    };
    let guarded = submit("Guarded", Some("охрана"));
    let odd = submit("Odd", Some("radiation"));
    let calm = submit("Calm", None);

    let requests = h.inbox.to(MODERATOR);
    assert!(requests[0].text.contains("Danger: охрана"));
    assert!(requests[1].text.contains("Danger: другое"));
    assert!(!requests[2].text.contains("Danger"));

    for spot in [guarded, odd, calm] {
        h.service.approve_spot(MODERATOR, spot).unwrap();
    }
    let dangers: Vec<(u64, Option<String>)> = h
        .service
        .list_spots()
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s.danger))
        .collect();
    assert_eq!(
        dangers,
        vec![
            (guarded, Some("охрана".to_string())),
            (odd, Some("другое".to_string())),
            (calm, None),
        ]
    );
}
