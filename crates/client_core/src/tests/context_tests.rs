use super::*;
use shared::domain::{Role, UserId};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("inventory-{label}-{nanos}"))
}

fn session() -> Session {
    Session {
        token: "jwt-token".to_string(),
        user: SessionUser {
            id: UserId(9),
            name: "Ana Pérez".to_string(),
            email: "ana@example.com".to_string(),
            role: Role::Admin,
        },
    }
}

#[test]
fn dark_mode_persists_across_loads() {
    let dir = temp_dir("prefs");
    let path = dir.join("nested").join(PREFERENCES_FILE);

    let mut context = AppContext::load(&path);
    assert!(!context.dark_mode());
    assert!(context.toggle_dark_mode().expect("toggle"));

    let reloaded = AppContext::load(&path);
    assert!(reloaded.dark_mode());
    assert_eq!(reloaded.preferences_path(), Some(path.as_path()));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn malformed_preferences_fall_back_to_defaults() {
    let dir = temp_dir("malformed");
    fs::create_dir_all(&dir).expect("create dir");
    let path = dir.join(PREFERENCES_FILE);
    fs::write(&path, "{ dark_mode: yes").expect("write");

    let context = AppContext::load(&path);
    assert_eq!(context.preferences(), &Preferences::default());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn in_memory_context_never_touches_disk() {
    let mut context = AppContext::in_memory();
    context.set_dark_mode(true).expect("set dark mode");
    assert!(context.dark_mode());
    assert!(context.preferences_path().is_none());
}

#[test]
fn session_is_held_until_sign_out() {
    let mut context = AppContext::in_memory();
    assert!(context.user().is_none());

    context.sign_in(session());
    assert_eq!(context.token(), Some("jwt-token"));
    assert_eq!(context.user().map(|u| u.role), Some(Role::Admin));

    let previous = context.sign_out().expect("signed in");
    assert_eq!(previous.user.id, UserId(9));
    assert!(context.session().is_none());
}
