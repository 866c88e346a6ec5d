//! Integration tests for the observation service.
//!
//! These tests run the full lifecycle against the in-memory store: draft
//! assembly, submission, moderation with distance estimation, soft delete,
//! item editing and the read side.

use std::sync::Arc;

use common::{AuthContext, Coordinates, DayId, ObservationId, ObservationStatus, UserId};
use domain::{
    AddItem, Decision, DeleteObservation, DomainError, ErrorKind, ListFilter, ModerateObservation,
    ObservationError, ObservationService, RemoveItem, SubmitObservation, UpdateComment, UpdateItem,
};
use store::{InMemoryObservationStore, ItemPatch, ObservationStore, ReferencedEvent, UserRecord};

const ALICE: UserId = UserId::new(1);
const BOB: UserId = UserId::new(2);
const MODERATOR: UserId = UserId::new(3);

const DAY_A: DayId = DayId::new(1);
const DAY_B: DayId = DayId::new(2);
const DAY_UNDATED: DayId = DayId::new(3);
const DAY_DELETED: DayId = DayId::new(4);

/// Two-point reference result: A (133.5752, 22.4028) on 21.02.2025 and
/// B (158.8320, 11.7454) on 20.03.2025.
const TWO_POINT_KM: f64 = 126_887_004.811_212_14;

fn alice() -> AuthContext {
    AuthContext::creator(ALICE)
}

fn bob() -> AuthContext {
    AuthContext::creator(BOB)
}

fn moderator() -> AuthContext {
    AuthContext::moderator(MODERATOR)
}

/// Helper to create a service over a seeded in-memory store
async fn create_service() -> ObservationService<InMemoryObservationStore> {
    let store = InMemoryObservationStore::new();
    for (id, login, is_moderator) in [(ALICE, "alice", false), (BOB, "bob", false), (MODERATOR, "mod", true)] {
        store
            .add_user(UserRecord {
                id,
                login: login.to_string(),
                is_moderator,
            })
            .await;
    }

    store
        .add_event(ReferencedEvent::new(
            DAY_A,
            "21.02.2025",
            Coordinates::new(133.5752, 22.4028),
        ))
        .await;
    store
        .add_event(ReferencedEvent::new(
            DAY_B,
            "20.03.2025",
            Coordinates::new(158.8320, 11.7454),
        ))
        .await;
    store
        .add_event(ReferencedEvent::new(
            DAY_UNDATED,
            "sometime in spring",
            Coordinates::new(10.0, 10.0),
        ))
        .await;
    let mut deleted = ReferencedEvent::new(DAY_DELETED, "01.01.2025", Coordinates::new(0.0, 0.0));
    deleted.is_deleted = true;
    store.add_event(deleted).await;

    ObservationService::new(store)
}

/// Adds the given days to the actor's draft and returns the draft id.
async fn draft_with(
    service: &ObservationService<InMemoryObservationStore>,
    auth: AuthContext,
    days: &[DayId],
) -> ObservationId {
    let mut draft_id = None;
    for day in days {
        let outcome = service.add_item(auth, AddItem::new(*day)).await.unwrap();
        draft_id = Some(outcome.draft_id);
    }
    draft_id.expect("at least one day")
}

async fn formed_with(
    service: &ObservationService<InMemoryObservationStore>,
    auth: AuthContext,
    days: &[DayId],
) -> ObservationId {
    let id = draft_with(service, auth, days).await;
    service
        .submit(auth, SubmitObservation::new(id))
        .await
        .unwrap();
    id
}

fn kind_of(result: Result<impl std::fmt::Debug, DomainError>) -> ErrorKind {
    result
        .unwrap_err()
        .kind()
        .expect("rule violation, not a store failure")
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= expected.abs() * 1e-9,
        "expected {expected}, got {actual}"
    );
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn approve_runs_estimator() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A, DAY_B]).await;

        let outcome = service
            .moderate(moderator(), ModerateObservation::new(id, Decision::Approve))
            .await
            .unwrap();

        assert_eq!(outcome.status, ObservationStatus::Finished);
        assert_close(outcome.result_distance_km.unwrap(), TWO_POINT_KM);

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ObservationStatus::Finished);
        assert_eq!(stored.moderator_id, Some(MODERATOR));
        assert!(stored.formed_at.is_some());
        assert!(stored.completed_at.is_some());
        assert_close(stored.result_distance_km.unwrap(), TWO_POINT_KM);
    }

    #[tokio::test]
    async fn reject_records_moderator_without_result() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A, DAY_B]).await;

        let outcome = service
            .moderate(
                moderator(),
                ModerateObservation::new(id, Decision::Reject).with_comment("blurry plates"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, ObservationStatus::Rejected);
        assert!(outcome.result_distance_km.is_none());

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ObservationStatus::Rejected);
        assert_eq!(stored.moderator_id, Some(MODERATOR));
        assert_eq!(stored.comment.as_deref(), Some("blurry plates"));
        assert!(stored.result_distance_km.is_none());
    }

    #[tokio::test]
    async fn fewer_than_two_dated_items_yield_zero() {
        let service = create_service().await;

        let single = formed_with(&service, alice(), &[DAY_A]).await;
        let outcome = service
            .moderate(moderator(), ModerateObservation::new(single, Decision::Approve))
            .await
            .unwrap();
        assert_eq!(outcome.result_distance_km, Some(0.0));

        // The undated day is dropped, leaving a single dated point.
        let undated = formed_with(&service, bob(), &[DAY_A, DAY_UNDATED]).await;
        let outcome = service
            .moderate(moderator(), ModerateObservation::new(undated, Decision::Approve))
            .await
            .unwrap();
        assert_eq!(outcome.result_distance_km, Some(0.0));
    }

    #[tokio::test]
    async fn submit_twice_is_invalid_state() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A]).await;

        let result = service.submit(alice(), SubmitObservation::new(id)).await;
        assert_eq!(kind_of(result), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn moderating_a_draft_is_invalid_state() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A]).await;

        for decision in [Decision::Approve, Decision::Reject] {
            let result = service
                .moderate(moderator(), ModerateObservation::new(id, decision))
                .await;
            assert_eq!(kind_of(result), ErrorKind::InvalidState);
        }

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ObservationStatus::Draft);
        assert!(stored.result_distance_km.is_none());
    }

    #[tokio::test]
    async fn non_moderator_cannot_approve() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A, DAY_B]).await;

        let err = service
            .moderate(alice(), ModerateObservation::new(id, Decision::Approve))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Observation(ObservationError::ModeratorRequired { action: "approve" })
        ));
        assert_eq!(err.kind(), Some(ErrorKind::InvalidState));
    }

    #[tokio::test]
    async fn submit_frees_creator_for_new_draft() {
        let service = create_service().await;
        let first = formed_with(&service, alice(), &[DAY_A]).await;

        let second = draft_with(&service, alice(), &[DAY_B]).await;
        assert_ne!(first, second);
        assert_eq!(service.store().draft_count(ALICE).await, 1);
    }

    #[tokio::test]
    async fn unknown_observation_is_not_found() {
        let service = create_service().await;
        let missing = ObservationId::new(404);

        let result = service.submit(alice(), SubmitObservation::new(missing)).await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);

        let result = service
            .moderate(moderator(), ModerateObservation::new(missing, Decision::Reject))
            .await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn delete_twice_is_a_no_op() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A]).await;

        let first = service
            .delete(alice(), DeleteObservation::new(id))
            .await
            .unwrap();
        assert_eq!(first.status, ObservationStatus::Deleted);

        let second = service
            .delete(alice(), DeleteObservation::new(id))
            .await
            .unwrap();
        assert_eq!(second.status, ObservationStatus::Deleted);
    }

    #[tokio::test]
    async fn deleting_another_creators_observation_is_not_found() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A]).await;

        let result = service.delete(bob(), DeleteObservation::new(id)).await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ObservationStatus::Draft);
    }

    #[tokio::test]
    async fn deleting_finished_observation_clears_result() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A, DAY_B]).await;
        service
            .moderate(moderator(), ModerateObservation::new(id, Decision::Approve))
            .await
            .unwrap();

        service
            .delete(alice(), DeleteObservation::new(id))
            .await
            .unwrap();

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ObservationStatus::Deleted);
        assert!(stored.result_distance_km.is_none());
    }

    #[tokio::test]
    async fn deleted_observation_is_gone_for_everyone() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A]).await;
        service
            .delete(alice(), DeleteObservation::new(id))
            .await
            .unwrap();

        assert_eq!(
            kind_of(service.get_observation(alice(), id).await),
            ErrorKind::NotFound
        );
        assert_eq!(
            kind_of(service.get_observation(moderator(), id).await),
            ErrorKind::NotFound
        );
        assert_eq!(
            kind_of(
                service
                    .moderate(moderator(), ModerateObservation::new(id, Decision::Approve))
                    .await
            ),
            ErrorKind::NotFound
        );
        assert_eq!(
            kind_of(
                service
                    .update_comment(alice(), UpdateComment::new(id, "late note"))
                    .await
            ),
            ErrorKind::NotFound
        );
    }
}

mod item_management {
    use super::*;

    #[tokio::test]
    async fn adding_same_day_twice_increments_quantity() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A, DAY_A]).await;

        let details = service.get_observation(alice(), id).await.unwrap();
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].quantity, 2);
        assert_eq!(details.items[0].event_id, DAY_A);
    }

    #[tokio::test]
    async fn adding_missing_or_deleted_day_is_not_found() {
        let service = create_service().await;

        for day in [DayId::new(99), DAY_DELETED] {
            let result = service.add_item(alice(), AddItem::new(day)).await;
            assert_eq!(kind_of(result), ErrorKind::NotFound);
        }
        // No draft was left behind by the failed transactions.
        assert_eq!(service.store().observation_count().await, 0);
    }

    #[tokio::test]
    async fn foreign_item_edits_are_not_found() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A]).await;

        let result = service
            .update_item(
                bob(),
                UpdateItem::new(id, DAY_A, ItemPatch::new().quantity(5)),
            )
            .await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);

        let result = service.remove_item(bob(), RemoveItem::new(id, DAY_A)).await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);

        let details = service.get_observation(alice(), id).await.unwrap();
        assert_eq!(details.items[0].quantity, 1);
    }

    #[tokio::test]
    async fn empty_update_is_a_successful_no_op() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A]).await;

        service
            .update_item(alice(), UpdateItem::new(id, DAY_A, ItemPatch::new()))
            .await
            .unwrap();

        let result = service
            .update_item(alice(), UpdateItem::new(id, DAY_B, ItemPatch::new()))
            .await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn items_stay_editable_while_formed() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A, DAY_B]).await;

        service
            .update_item(
                alice(),
                UpdateItem::new(
                    id,
                    DAY_B,
                    ItemPatch::new().sort_order(-1).primary(true).note("clear sky"),
                ),
            )
            .await
            .unwrap();

        let details = service.get_observation(alice(), id).await.unwrap();
        assert_eq!(details.items[0].event_id, DAY_B);
        assert!(details.items[0].is_primary);
        assert_eq!(details.items[0].note.as_deref(), Some("clear sky"));

        service
            .remove_item(alice(), RemoveItem::new(id, DAY_A))
            .await
            .unwrap();
        let details = service.get_observation(alice(), id).await.unwrap();
        assert_eq!(details.items.len(), 1);
    }

    #[tokio::test]
    async fn items_are_frozen_after_moderation() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A]).await;
        service
            .moderate(moderator(), ModerateObservation::new(id, Decision::Reject))
            .await
            .unwrap();

        let result = service.remove_item(alice(), RemoveItem::new(id, DAY_A)).await;
        assert_eq!(kind_of(result), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn coordinate_override_feeds_the_estimator() {
        let service = create_service().await;
        let id = draft_with(&service, alice(), &[DAY_A, DAY_B]).await;

        // Pin B onto A's position: no angular displacement, no estimate.
        service
            .update_item(
                alice(),
                UpdateItem::new(
                    id,
                    DAY_B,
                    ItemPatch::new().coordinates(Coordinates::new(133.5752, 22.4028)),
                ),
            )
            .await
            .unwrap();
        service
            .submit(alice(), SubmitObservation::new(id))
            .await
            .unwrap();

        let outcome = service
            .moderate(moderator(), ModerateObservation::new(id, Decision::Approve))
            .await
            .unwrap();
        assert_eq!(outcome.result_distance_km, Some(0.0));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_store() {
        let service = create_service().await;

        let result = service.add_item(alice(), AddItem::new(DayId::new(0))).await;
        assert_eq!(kind_of(result), ErrorKind::Validation);
        assert_eq!(service.store().observation_count().await, 0);

        let result = service
            .update_item(
                alice(),
                UpdateItem::new(
                    ObservationId::new(1),
                    DAY_A,
                    ItemPatch::new().coordinates(Coordinates::new(12.0, 95.0)),
                ),
            )
            .await;
        assert_eq!(kind_of(result), ErrorKind::Validation);
    }
}

mod read_side {
    use super::*;

    #[tokio::test]
    async fn listing_hides_drafts_and_deleted() {
        let service = create_service().await;
        let formed = formed_with(&service, alice(), &[DAY_A]).await;
        let deleted = formed_with(&service, alice(), &[DAY_B]).await;
        service
            .delete(alice(), DeleteObservation::new(deleted))
            .await
            .unwrap();
        draft_with(&service, alice(), &[DAY_A]).await;

        let listed = service
            .list_observations(moderator(), ListFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![formed]);
        assert_eq!(listed[0].creator_login, "alice");
    }

    #[tokio::test]
    async fn listing_scopes_non_moderators() {
        let service = create_service().await;
        let from_alice = formed_with(&service, alice(), &[DAY_A]).await;
        let from_bob = formed_with(&service, bob(), &[DAY_A]).await;

        let mine = service
            .list_observations(bob(), ListFilter::default())
            .await
            .unwrap();
        assert_eq!(mine.iter().map(|o| o.id).collect::<Vec<_>>(), vec![from_bob]);

        // Newest first.
        let all = service
            .list_observations(moderator(), ListFilter::default())
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![from_bob, from_alice]
        );
    }

    #[tokio::test]
    async fn listing_filters_by_status() {
        let service = create_service().await;
        let finished = formed_with(&service, alice(), &[DAY_A]).await;
        service
            .moderate(moderator(), ModerateObservation::new(finished, Decision::Approve))
            .await
            .unwrap();
        formed_with(&service, bob(), &[DAY_A]).await;

        let filter = ListFilter {
            status: Some(ObservationStatus::Finished),
            ..Default::default()
        };
        let listed = service.list_observations(moderator(), filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, finished);
        assert_eq!(listed[0].moderator_login.as_deref(), Some("mod"));
    }

    #[tokio::test]
    async fn draft_summary_tracks_the_open_draft() {
        let service = create_service().await;

        let empty = service.draft_summary(alice()).await.unwrap();
        assert_eq!(empty.draft_id, None);
        assert_eq!(empty.item_count, 0);

        let id = draft_with(&service, alice(), &[DAY_A, DAY_A, DAY_B]).await;
        let summary = service.draft_summary(alice()).await.unwrap();
        assert_eq!(summary.draft_id, Some(id));
        assert_eq!(summary.item_count, 2);

        service
            .submit(alice(), SubmitObservation::new(id))
            .await
            .unwrap();
        assert_eq!(service.draft_summary(alice()).await.unwrap().draft_id, None);
    }

    #[tokio::test]
    async fn comment_is_editable_until_moderation() {
        let service = create_service().await;
        let id = formed_with(&service, alice(), &[DAY_A]).await;

        service
            .update_comment(alice(), UpdateComment::new(id, "two nights of data"))
            .await
            .unwrap();
        let details = service.get_observation(alice(), id).await.unwrap();
        assert_eq!(
            details.observation.comment.as_deref(),
            Some("two nights of data")
        );

        service
            .moderate(moderator(), ModerateObservation::new(id, Decision::Reject))
            .await
            .unwrap();
        let result = service
            .update_comment(alice(), UpdateComment::new(id, "too late"))
            .await;
        assert_eq!(kind_of(result), ErrorKind::InvalidState);
    }
}

mod concurrency {
    use futures_util::future::join_all;
    use store::ObservationStore;

    use super::*;

    /// Races two moderators on one formed observation.
    async fn race_moderation(first: Decision, second: Decision) {
        let service = Arc::new(create_service().await);
        let id = formed_with(&service, alice(), &[DAY_A, DAY_B]).await;

        let tasks = [first, second].map(|decision| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .moderate(moderator(), ModerateObservation::new(id, decision))
                    .await
            })
        });
        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let (wins, losses): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
        let winner = wins.into_iter().next().unwrap().unwrap();
        let loser = losses.into_iter().next().unwrap();
        assert_eq!(kind_of(loser), ErrorKind::InvalidState);

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, winner.status);
        assert_eq!(stored.result_distance_km, winner.result_distance_km);
        assert_eq!(stored.moderator_id, Some(MODERATOR));
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_approvals_complete_once() {
        race_moderation(Decision::Approve, Decision::Approve).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn approve_and_reject_race_has_one_winner() {
        race_moderation(Decision::Approve, Decision::Reject).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_submits_form_once() {
        let service = Arc::new(create_service().await);
        let id = draft_with(&service, alice(), &[DAY_A]).await;

        let tasks = (0..2).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.submit(alice(), SubmitObservation::new(id)).await })
        });
        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.into_iter().find(|r| r.is_err()).unwrap();
        assert_eq!(kind_of(loser), ErrorKind::InvalidState);

        let stored = service.store().find_observation(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ObservationStatus::Formed);
        assert!(stored.formed_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_share_one_draft() {
        let service = Arc::new(create_service().await);

        let tasks = (0..20).map(|i| {
            let service = Arc::clone(&service);
            let day = if i % 2 == 0 { DAY_A } else { DAY_B };
            tokio::spawn(async move { service.add_item(alice(), AddItem::new(day)).await })
        });
        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let draft_id = outcomes[0].draft_id;
        assert!(outcomes.iter().all(|o| o.draft_id == draft_id));
        assert_eq!(outcomes.iter().filter(|o| o.created_draft).count(), 1);
        assert_eq!(service.store().draft_count(ALICE).await, 1);

        let details = service.get_observation(alice(), draft_id).await.unwrap();
        let total: u32 = details.items.iter().map(|item| item.quantity).sum();
        assert_eq!(details.items.len(), 2);
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn creators_do_not_share_drafts() {
        let service = create_service().await;

        let (a, b) = tokio::join!(
            service.add_item(alice(), AddItem::new(DAY_A)),
            service.add_item(bob(), AddItem::new(DAY_A)),
        );
        assert_ne!(a.unwrap().draft_id, b.unwrap().draft_id);
    }
}
