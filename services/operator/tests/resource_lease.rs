mod harness;

use chrono::Duration;
use harness::TestEnv;
use rbo_operator::api::{format_timestamp, ResourcePhase};
use rbo_operator::cloud::{
    CloudResource, ComputeGroup, InstanceState, DB_AVAILABLE, DB_STOPPED, EXPIRY_TAG, HOLDER_TAG,
};
use rbo_operator::ReconcileError;
use rbo_operator::store::Store;
use rbo_reconcile::{Action, Reconciler};

#[tokio::test]
async fn test_booked_resource_starts_and_takes_lease() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 3, true);
    let mut resource = env.add_resource("analytics", "ec2").await;
    let until = env.now() + Duration::hours(2);
    resource.spec.booked_by = Some("alice".into());
    resource.spec.booked_until = Some(format_timestamp(until));
    env.store.update(&resource).await.unwrap();

    let action = env
        .resource_controller()
        .reconcile(&resource.key())
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(std::time::Duration::from_secs(15)));

    let status = env.resource("analytics").await.status;
    assert_eq!(status.status, ResourcePhase::Running);
    assert_eq!((status.instances, status.running), (3, 3));
    let uid = resource.meta.uid.unwrap().to_string();
    assert_eq!(status.locked_by.as_deref(), Some(uid.as_str()));
    assert_eq!(status.locked_until, Some(format_timestamp(until)));

    let tags = env.compute.instance("analytics-2").unwrap().tags;
    assert_eq!(tags.get(HOLDER_TAG), Some(&uid));
    assert_eq!(tags.get(EXPIRY_TAG), Some(&format_timestamp(until)));
}

#[tokio::test]
async fn test_unbooked_resource_stops_and_releases_lease() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 2, true);
    let mut resource = env.add_resource("analytics", "ec2").await;
    resource.spec.booked_by = Some("alice".into());
    resource.spec.booked_until = Some(format_timestamp(env.now() + Duration::hours(1)));
    let resource = env.store.update(&resource).await.unwrap();
    let controller = env.resource_controller();
    controller.reconcile(&resource.key()).await.unwrap();

    env.advance(Duration::hours(1));
    controller.reconcile(&resource.key()).await.unwrap();

    let status = env.resource("analytics").await.status;
    assert_eq!(status.status, ResourcePhase::Stopped);
    assert!(status.locked_by.is_none());
    assert!(!env
        .compute
        .instance("analytics-0")
        .unwrap()
        .tags
        .contains_key(HOLDER_TAG));
    assert_eq!(env.compute.calls().stops(), 1);
}

#[tokio::test]
async fn test_steady_state_makes_no_provider_calls() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 2, true);
    let resource = env.add_resource("analytics", "ec2").await;
    let controller = env.resource_controller();

    controller.reconcile(&resource.key()).await.unwrap();
    let version = env.resource("analytics").await.meta.resource_version;
    controller.reconcile(&resource.key()).await.unwrap();

    assert_eq!(env.compute.calls().starts(), 0);
    assert_eq!(env.compute.calls().stops(), 0);
    assert_eq!(env.resource("analytics").await.meta.resource_version, version);
}

#[tokio::test]
async fn test_partially_running_group_is_pending_then_stopped() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 2, true);
    env.compute.set_state("analytics-0", InstanceState::Running);
    let resource = env.add_resource("analytics", "ec2").await;

    env.resource_controller()
        .reconcile(&resource.key())
        .await
        .unwrap();

    assert_eq!(env.compute.calls().stops(), 1);
    assert_eq!(
        env.compute.instance("analytics-0").unwrap().state,
        InstanceState::Stopped
    );
    assert_eq!(env.resource("analytics").await.status.status, ResourcePhase::Stopped);
}

#[tokio::test]
async fn test_foreign_lease_blocks_until_expiry() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 1, true);

    // Another holder started the group through its own handle.
    let foreign = ComputeGroup::new(env.compute.clone(), env.clock.clone(), "analytics");
    let foreign_until = env.now() + Duration::minutes(30);
    foreign.start("uid_other", foreign_until).await.unwrap();

    let resource = env.add_resource("analytics", "ec2").await;
    let controller = env.resource_controller();
    let err = controller.reconcile(&resource.key()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Locked { ref holder, .. } if holder == "uid_other"));
    assert_eq!(
        controller.error_policy(&resource.key(), &err),
        Action::requeue(std::time::Duration::from_secs(15))
    );
    let status = env.resource("analytics").await.status;
    assert_eq!(status.status, ResourcePhase::Running);
    assert_eq!(status.locked_by.as_deref(), Some("uid_other"));
    assert_eq!(status.locked_until, Some(format_timestamp(foreign_until)));

    env.advance(Duration::minutes(31));
    controller.reconcile(&resource.key()).await.unwrap();
    assert_eq!(env.resource("analytics").await.status.status, ResourcePhase::Stopped);
}

#[tokio::test]
async fn test_lease_conflict_between_holders() {
    let env = TestEnv::new();
    env.compute.add_group("web", 2, false);
    let group = ComputeGroup::new(env.compute.clone(), env.clock.clone(), "web");
    let first_until = env.now() + Duration::hours(1);

    group.start("uid_a", first_until).await.unwrap();

    let err = group
        .start("uid_b", env.now() + Duration::hours(3))
        .await
        .unwrap_err();
    assert!(err.is_locked());

    env.advance(Duration::hours(1) + Duration::seconds(1));
    let second_until = env.now() + Duration::hours(3);
    group.start("uid_b", second_until).await.unwrap();

    let lease = group.status().await.unwrap().lease.unwrap();
    assert_eq!(lease.holder, "uid_b");
    assert_eq!(lease.until(), Some(format_timestamp(second_until)));
}

#[tokio::test]
async fn test_unreadable_booked_until_leaves_group_alone() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 1, true);
    env.compute.set_state("analytics-0", InstanceState::Running);
    let mut resource = env.add_resource("analytics", "ec2").await;
    resource.spec.booked_by = Some("alice".into());
    resource.spec.booked_until = Some("tomorrow-ish".into());
    env.store.update(&resource).await.unwrap();

    env.resource_controller()
        .reconcile(&resource.key())
        .await
        .unwrap();

    assert_eq!(env.compute.calls().starts(), 0);
    assert_eq!(env.compute.calls().stops(), 0);
    assert_eq!(env.resource("analytics").await.status.status, ResourcePhase::Running);
}

#[tokio::test]
async fn test_provider_failure_backs_off_without_status_commit() {
    let env = TestEnv::new();
    env.compute.add_group("analytics", 1, true);
    let resource = env.add_resource("analytics", "ec2").await;
    let controller = env.resource_controller();
    env.compute.fail_with("RequestLimitExceeded");

    let err = controller.reconcile(&resource.key()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Provider(_)));
    assert_eq!(
        controller.error_policy(&resource.key(), &err),
        Action::requeue(std::time::Duration::from_secs(60))
    );
    assert_eq!(
        env.resource("analytics").await.meta.resource_version,
        resource.meta.resource_version
    );
}

#[tokio::test]
async fn test_unknown_type_is_not_retried() {
    let env = TestEnv::new();
    let resource = env.add_resource("bucket", "s3").await;
    let controller = env.resource_controller();

    let err = controller.reconcile(&resource.key()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Configuration(_)));
    assert_eq!(controller.error_policy(&resource.key(), &err), Action::AwaitChange);
}

#[tokio::test]
async fn test_database_group_follows_booking() {
    let env = TestEnv::new();
    env.database.add_group("reports", 2, true);
    let mut resource = env.add_resource("reports", "rds").await;
    resource.spec.booked_by = Some("alice".into());
    resource.spec.booked_until = Some(format_timestamp(env.now() + Duration::hours(1)));
    let resource = env.store.update(&resource).await.unwrap();
    let controller = env.resource_controller();

    controller.reconcile(&resource.key()).await.unwrap();
    assert_eq!(env.database.instance("reports-1").unwrap().status, DB_AVAILABLE);
    assert_eq!(env.resource("reports").await.status.status, ResourcePhase::Running);

    env.advance(Duration::hours(2));
    controller.reconcile(&resource.key()).await.unwrap();
    assert_eq!(env.database.instance("reports-0").unwrap().status, DB_STOPPED);
    assert!(env.database.tags("reports-0").get(HOLDER_TAG).is_none());
}

#[tokio::test]
async fn test_empty_group_reads_as_stopped() {
    let env = TestEnv::new();
    let resource = env.add_resource("ghost", "ec2").await;

    env.resource_controller()
        .reconcile(&resource.key())
        .await
        .unwrap();

    let status = env.resource("ghost").await.status;
    assert_eq!(status.status, ResourcePhase::Stopped);
    assert_eq!(status.instances, 0);
}
