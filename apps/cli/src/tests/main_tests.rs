use super::*;

#[test]
fn filter_argument_splits_on_first_equals() {
    assert_eq!(
        parse_filter("status=Disponible").expect("filter"),
        ("status".to_string(), "Disponible".to_string())
    );
    assert_eq!(
        parse_filter("notes=a=b").expect("filter"),
        ("notes".to_string(), "a=b".to_string())
    );
    assert_eq!(
        parse_filter("status=").expect("filter"),
        ("status".to_string(), String::new())
    );
    assert!(parse_filter("status").is_err());
    assert!(parse_filter("=Disponible").is_err());
}

#[test]
fn search_command_parses_entity_term_and_filters() {
    let args = Args::try_parse_from([
        "inventory",
        "search",
        "equipment",
        "dell",
        "--filter",
        "status=Disponible",
        "--page-size",
        "5",
    ])
    .expect("parse");

    match args.command {
        Command::Search {
            entity,
            term,
            filters,
            page,
            page_size,
        } => {
            assert_eq!(entity, Entity::Equipment);
            assert_eq!(term, "dell");
            assert_eq!(
                filters,
                vec![("status".to_string(), "Disponible".to_string())]
            );
            assert_eq!(page, 1);
            assert_eq!(page_size, Some(5));
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn dark_mode_defaults_to_toggle() {
    let args = Args::try_parse_from(["inventory", "dark-mode"]).expect("parse");
    assert!(matches!(
        args.command,
        Command::DarkMode {
            state: Toggle::Toggle
        }
    ));
}

#[test]
fn entity_names_map_to_endpoints() {
    assert_eq!(Entity::Equipment.kind().path, "equipment");
    assert_eq!(Entity::Users.kind().path, "users");
    assert_eq!(Entity::History.kind().path, "history");
    assert_eq!(Entity::Actas.kind().path, "actas");
}

#[test]
fn page_size_flag_rejects_zero_and_falls_back_to_settings() {
    let settings = Settings {
        page_size: 25,
        ..Settings::default()
    };
    assert_eq!(resolve_page_size(None, &settings).expect("default"), 25);
    assert_eq!(resolve_page_size(Some(5), &settings).expect("flag"), 5);

    let err = resolve_page_size(Some(0), &settings).expect_err("zero page size");
    assert!(err.to_string().contains("--page-size"));
}
