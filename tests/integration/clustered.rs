//! Wires the cluster-safe scenarios up to a concrete `#[tokio::test]`
//! against a Redis Cluster deployment. Scenarios that touch more than one
//! key without a shared hash tag are otherwise left out of this file — see
//! [`crate::integration::utils::run_cluster`] — except
//! `should_reject_a_watch_spanning_multiple_slots`, which exists precisely
//! to exercise the synchronous `CROSSSLOT` rejection.

#[cfg(feature = "i-cluster")]
mod cluster {
  cluster_test!(cluster, should_set_and_get_across_the_cluster);
  cluster_test!(cluster, should_route_same_hash_tag_keys_together);
}

#[cfg(feature = "i-keys")]
mod keys {
  cluster_test!(keys, should_set_and_get_a_value);
  cluster_test!(keys, should_incr_a_missing_key_from_zero);
  cluster_test!(keys, should_report_exists_correctly);
  cluster_test!(keys, should_expire_and_read_back_ttl);
}

#[cfg(feature = "i-hashes")]
mod hashes {
  cluster_test!(hashes, should_hset_and_hget_a_field);
  cluster_test!(hashes, should_hgetall_every_field);
}

#[cfg(feature = "i-lists")]
mod lists {
  cluster_test!(lists, should_lpush_and_lrange_a_list);
  cluster_test!(lists, should_report_the_new_length_after_lpush);
}

#[cfg(feature = "i-server")]
mod server {
  cluster_test!(server, should_ping_the_server);
  cluster_test!(server, should_echo_back_the_message);
}

#[cfg(feature = "i-pubsub")]
mod pubsub {
  cluster_test!(pubsub, should_publish_with_no_subscribers);
  cluster_test!(pubsub, should_subscribe_without_error);
}

#[cfg(feature = "transactions")]
mod multi {
  cluster_test!(multi, should_commit_a_transaction);
  cluster_test!(multi, should_abort_a_watched_transaction_on_concurrent_write);
  cluster_test!(multi, should_reject_a_watch_spanning_multiple_slots);
  cluster_test!(multi, should_commit_a_watched_transaction_across_a_shared_hash_tag);
}
