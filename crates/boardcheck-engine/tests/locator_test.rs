mod common;

use boardcheck_engine::protocol::{MatchMode, Selector};
use boardcheck_engine::resolution::{Interaction, LocatorChain, LocatorError, Strategy};
use common::FakeBoard;
use std::time::Duration;

fn chain_of(css: &[&str]) -> LocatorChain {
    LocatorChain::new(
        "widget",
        css.iter().map(|c| Strategy::new(Selector::css(*c))).collect(),
    )
}

#[tokio::test]
async fn test_first_matching_strategy_wins_and_later_ones_are_never_queried() {
    let mut board = FakeBoard::new();
    board.add(None, "div.third", "");
    board.add(None, "div.fourth", "");

    let chain = chain_of(&[".first", ".second", ".third", ".fourth"]);
    let located = chain.locate(&mut board).await.unwrap();

    assert_eq!(located.strategy_index, 2);
    assert_eq!(located.strategy, ".third");
    assert_eq!(board.queries_for(".first"), 1);
    assert_eq!(board.queries_for(".second"), 1);
    assert_eq!(board.queries_for(".fourth"), 0);
}

#[tokio::test]
async fn test_all_failing_strategies_report_exhaustion() {
    let mut board = FakeBoard::new();
    board.add(None, "div.unrelated", "");

    let err = chain_of(&[".a", ".b", "bad:selector"])
        .locate(&mut board)
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.target(), "widget");
    assert_eq!(err.attempted(), &[".a", ".b", "bad:selector"]);
}

#[tokio::test]
async fn test_hidden_elements_do_not_count() {
    let mut board = FakeBoard::new();
    let hidden = board.add(None, "div.target", "");
    board.hide(hidden);
    let parent = board.add(None, "section.hidden-parent", "");
    board.hide(parent);
    board.add(Some(parent), "div.target", "");
    let shown = board.add(None, "div.target", "");

    let located = chain_of(&[".target"]).locate(&mut board).await.unwrap();
    assert_eq!(located.element.handle, shown);
}

#[tokio::test]
async fn test_query_errors_are_swallowed() {
    let mut board = FakeBoard::new();
    board.add(None, "div.b", "");
    board.fail_on = Some(".a".into());

    let located = chain_of(&[".a", ".b"]).locate(&mut board).await.unwrap();
    assert_eq!(located.strategy_index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_strategy_polls_until_element_becomes_visible() {
    let mut board = FakeBoard::new();
    let late = board.add(None, "button.late", "");
    board.appear_after(late, 4);

    let chain = chain_of(&[".late"]).with_budget(Duration::from_secs(1), Duration::from_millis(100));
    let located = chain.locate(&mut board).await.unwrap();

    assert_eq!(located.element.handle, late);
    assert_eq!(board.queries_for(".late"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_each_strategy_gets_its_own_budget() {
    let mut board = FakeBoard::new();
    board.add(None, "div.b", "");

    let chain = chain_of(&[".a", ".b"]).with_budget(Duration::from_millis(300), Duration::from_millis(100));
    let started = tokio::time::Instant::now();
    let located = chain.locate(&mut board).await.unwrap();

    assert_eq!(located.strategy_index, 1);
    assert_eq!(board.queries_for(".a"), 4);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_interaction_failure_falls_through_to_next_strategy() {
    let mut board = FakeBoard::new();
    let covered = board.add(None, "button.primary", "Go");
    board.make_unclickable(covered);
    let fallback = board.add(None, "button.secondary", "Go");

    let located = chain_of(&[".primary", ".secondary"])
        .locate_and(&mut board, Interaction::Click)
        .await
        .unwrap();

    assert_eq!(located.element.handle, fallback);
    assert_eq!(board.clicks, vec![fallback]);
}

#[tokio::test]
async fn test_found_but_unusable_is_not_exhaustion() {
    let mut board = FakeBoard::new();
    let covered = board.add(None, "button.only", "Go");
    board.make_unclickable(covered);

    let err = chain_of(&[".only", ".missing"])
        .locate_and(&mut board, Interaction::Click)
        .await
        .unwrap_err();

    assert!(matches!(err, LocatorError::NotInteractable { .. }));
    assert!(!err.is_exhausted());
    assert!(board.clicks.is_empty());
}

#[tokio::test]
async fn test_enclosing_strategy_returns_ancestor() {
    let mut board = FakeBoard::new();
    let group = board.add(None, "div.o_kanban_group", "");
    board.add(Some(group), "span.o_column_title", "Resolved");

    let chain = LocatorChain::new(
        "section",
        vec![
            Strategy {
                selector: Selector::css_text(".o_column_title", "Resolved").with_mode(MatchMode::Exact),
                enclose: Some(".missing-container".into()),
            },
            Strategy {
                selector: Selector::css_text(".o_column_title", "Resolved").with_mode(MatchMode::Exact),
                enclose: Some(".o_kanban_group".into()),
            },
        ],
    );

    let located = chain.locate(&mut board).await.unwrap();
    assert_eq!(located.strategy_index, 1);
    assert_eq!(located.element.handle, group);
    assert!(located.strategy.contains("closest(.o_kanban_group)"));
}

#[tokio::test]
async fn test_scoped_chain_ignores_elements_outside_scope() {
    let mut board = FakeBoard::new();
    board.add(None, "div.card", "Outside");
    let column = board.add(None, "div.column", "");
    let inside = board.add(Some(column), "div.card", "Inside");

    let located = chain_of(&[".card"]).within(column).locate(&mut board).await.unwrap();
    assert_eq!(located.element.handle, inside);
}

#[tokio::test]
async fn test_typing_reaches_the_located_field() {
    let mut board = FakeBoard::new();
    let field = board.add(None, "input#login", "");

    chain_of(&["#login"])
        .locate_and(
            &mut board,
            Interaction::ClearAndType {
                text: "ops@example.com",
                key_delay: Duration::ZERO,
            },
        )
        .await
        .unwrap();

    assert_eq!(board.typed, vec![(field, "ops@example.com".to_string())]);
}
