//! The in-memory backend is only built for unit tests or with `--features mock`.
#![cfg(feature = "mock")]

use git_access::git::backend::{MockBackend, MockCommit};

#[test]
fn mock_backend_behind_the_feature() {
    let mock = MockBackend::new();
    let tree = mock.tree(&[("f", mock.blob("x"))]);
    let id = mock.commit(MockCommit::new(tree, &[], "one", 1));
    mock.set_ref("refs/heads/main", id);
    mock.set_head("main");
    let repo = mock.repository();
    assert_eq!(repo.get_commit("main").unwrap().id(), id);
    assert!(!repo.is_empty().unwrap());
}
