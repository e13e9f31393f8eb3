use super::*;

#[test]
fn parse_method_accepts_any_case() {
    assert_eq!(parse_method("get").unwrap(), reqwest::Method::GET);
    assert_eq!(parse_method("Post").unwrap(), reqwest::Method::POST);
    assert!(matches!(parse_method("BAD METHOD"), Err(CliError::InvalidMethod(_))));
}

#[test]
fn parse_data_skips_blank_bodies() {
    assert!(parse_data(None).unwrap().is_none());
    assert!(parse_data(Some("  ")).unwrap().is_none());
    assert_eq!(parse_data(Some(r#"{"a":1}"#)).unwrap(), Some(json!({ "a": 1 })));
    assert!(matches!(parse_data(Some("{")), Err(CliError::InvalidJson(_))));
}

#[test]
fn page_args_are_normalized() {
    let args = PageArgs { page: 0, rows: -3, keyword: "rust".to_owned() };
    let params = args.params();
    assert_eq!(params.page, 1);
    assert_eq!(params.rows, 10);
    assert_eq!(params.keyword, "rust");
}

#[test]
fn parses_nested_subcommands() {
    let cli = Cli::try_parse_from(["blogdesk", "comment", "list", "7", "--page", "2"]).unwrap();
    match cli.command {
        Command::Comment(CommentCommand { command: CommentSubcommand::List { article_id, page } }) => {
            assert_eq!(article_id, 7);
            assert_eq!(page.page, 2);
            assert_eq!(page.rows, 10);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["blogdesk", "category", "delete", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Category(CategoryCommand { command: CategorySubcommand::Delete { id: 3, mode: 1 } })
    ));
}

#[test]
fn request_takes_method_path_and_body() {
    let cli = Cli::try_parse_from(["blogdesk", "request", "post", "/api/x", "--data", "{}"]).unwrap();
    match cli.command {
        Command::Request { method, path, data } => {
            assert_eq!(method, "post");
            assert_eq!(path, "/api/x");
            assert_eq!(data.as_deref(), Some("{}"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn flat_lines_walk_depth_first() {
    let child = Category { id: 2, parent_id: 1, name: "async".to_owned(), ..Category::default() };
    let root = Category { id: 1, name: "rust".to_owned(), children: vec![child], ..Category::default() };
    let other = Category { id: 3, name: "go".to_owned(), ..Category::default() };
    assert_eq!(flat_lines(&[root, other]), vec!["1\t0\trust", "2\t1\tasync", "3\t0\tgo"]);
}

#[test]
fn parses_reply_and_notification_commands() {
    let cli = Cli::try_parse_from(["blogdesk", "reply", "add", "5", "--content", "hi", "--to-uid", "9"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Reply(ReplyCommand { command: ReplySubcommand::Add { comment_id: 5, to_uid: 9, .. } })
    ));

    let cli = Cli::try_parse_from(["blogdesk", "notification", "read-all"]).unwrap();
    assert!(matches!(
        cli.command,
        Command::Notification(NotificationCommand { command: NotificationSubcommand::ReadAll })
    ));

    let cli = Cli::try_parse_from(["blogdesk", "article", "ranking", "--by", "reads"]).unwrap();
    match cli.command {
        Command::Article(ArticleCommand { command: ArticleSubcommand::Ranking { by } }) => {
            assert_eq!(Ranking::from(by), Ranking::Reads);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
