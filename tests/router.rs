//! Router, groups and static mounts exercised through the in-process engine.

use std::sync::{Arc, Mutex};

use keel::engine::{memory, radix};
use keel::middleware::{Next, from_fn};
use keel::{
    Aborter, BoxFuture, Context, Error, MemoryEngine, Method, Middleware, Request, Result, Router,
    Routes, StatusCode, handler_fn,
};

fn get(path: &str) -> Request {
    Request::from_target(Method::Get, path)
}

fn echo_path(ctx: &mut Context) -> BoxFuture<'_, Result> {
    Box::pin(async move {
        let path = ctx.path().to_owned();
        ctx.text(path);
        Ok(())
    })
}

fn stamp(name: &'static str) -> impl Middleware + use<> {
    from_fn(move |ctx, next| {
        Box::pin(async move {
            let result = next.run(ctx).await;
            let seen = ctx.response().header("x-stamp").unwrap_or_default().to_owned();
            ctx.set_header("x-stamp", &format!("{name}{seen}"));
            result
        })
    })
}

#[tokio::test]
async fn groups_inherit_without_leaking_to_siblings() {
    let mut app = Router::new(MemoryEngine::new());
    app.middleware(stamp("root"));
    {
        let mut admin = app.group("/admin");
        admin.middleware(stamp("admin,"));
        admin.get("/panel", echo_path);

        let mut audit = admin.group("audit");
        audit.get("/log", echo_path);
    }
    {
        let mut public = app.group("/public");
        public.get("/about", echo_path);
    }
    app.middleware(stamp("late,"));
    app.get("/late", echo_path);

    let engine = app.into_engine();

    let res = engine.dispatch(get("/admin/panel")).await;
    assert_eq!(res.text(), "/admin/panel");
    assert_eq!(res.header("x-stamp"), Some("rootadmin,"));

    let res = engine.dispatch(get("/admin/audit/log")).await;
    assert_eq!(res.header("x-stamp"), Some("rootadmin,"));

    let res = engine.dispatch(get("/public/about")).await;
    assert_eq!(res.header("x-stamp"), Some("root"));

    let res = engine.dispatch(get("/late")).await;
    assert_eq!(res.header("x-stamp"), Some("rootlate,"));
}

#[tokio::test]
async fn group_with_appends_middleware_to_the_inherited_chain() {
    let mut app = Router::new(MemoryEngine::new());
    app.middleware(stamp("root,"));
    app.group_with("/v2", [stamp("a,"), stamp("b,")]).get("/ping", echo_path);
    app.get("/ping", echo_path);
    let engine = app.into_engine();

    let res = engine.dispatch(get("/v2/ping")).await;
    assert_eq!(res.header("x-stamp"), Some("root,a,b,"));

    let res = engine.dispatch(get("/ping")).await;
    assert_eq!(res.header("x-stamp"), Some("root,"));
}

#[tokio::test]
async fn base_paths_join_cleanly() {
    let mut app = Router::new(MemoryEngine::new());
    let shared: &Router<MemoryEngine> = &app;
    assert_eq!(shared.base_path(), "/");
    let mut api = app.group("api/");
    assert_eq!(api.base_path(), "/api/");
    let mut v1 = api.group("//v1");
    assert_eq!(v1.base_path(), "/api/v1");
    v1.get("users", echo_path);

    let engine = app.into_engine();
    assert_eq!(engine.dispatch(get("/api/v1/users")).await.text(), "/api/v1/users");
}

#[tokio::test]
async fn unmatched_routes_answer_404() {
    let mut app = Router::new(MemoryEngine::new());
    app.get("/here", echo_path);
    let engine = app.into_engine();

    assert_eq!(engine.dispatch(get("/there")).await.status(), StatusCode::NOT_FOUND);
    let post = Request::new(Method::Post, "/here");
    assert_eq!(engine.dispatch(post).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn method_names_are_case_insensitive_and_any_covers_all() {
    assert_eq!("pAtCh".parse::<Method>().unwrap(), Method::Patch);
    assert!("BREW".parse::<Method>().is_err());

    let mut app = Router::new(MemoryEngine::new());
    app.handle("delete".parse().unwrap(), "/item", echo_path);
    app.any("/anything", echo_path);
    let engine = app.into_engine();

    let res = engine.dispatch(Request::new(Method::Delete, "/item")).await;
    assert_eq!(res.status(), StatusCode::OK);

    for method in Method::ALL {
        let res = engine.dispatch(Request::new(method, "/anything")).await;
        assert_eq!(res.status(), StatusCode::OK, "{method}");
    }
}

fn tail_params(ctx: &mut Context) -> BoxFuture<'_, Result> {
    Box::pin(async move {
        let named = ctx.param("filepath").unwrap_or("-").to_owned();
        let anonymous = ctx.param("*").unwrap_or("-").to_owned();
        ctx.text(format!("{named}|{anonymous}"));
        Ok(())
    })
}

#[tokio::test]
async fn catch_all_is_reachable_by_its_written_name() {
    let mut app = Router::new(MemoryEngine::new());
    app.get("/files/*filepath", tail_params);
    let engine = app.into_engine();

    let res = engine.dispatch(get("/files/css/site.css")).await;
    assert_eq!(res.text(), "css/site.css|css/site.css");

    let res = engine.dispatch(get("/files/")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

async fn user_fields(ctx: &mut Context) -> Result {
    let body = format!(
        "{}:{}",
        ctx.param("id").unwrap_or_default(),
        ctx.query("fields").unwrap_or_default()
    );
    ctx.text(body);
    Ok(())
}

#[tokio::test]
async fn params_and_query_reach_the_handler() {
    let mut app = Router::new(MemoryEngine::new());
    app.get("/users/:id", handler_fn(|ctx| Box::pin(user_fields(ctx))));
    let engine = app.into_engine();

    let res = engine.dispatch(get("/users/42?fields=name")).await;
    assert_eq!(res.text(), "42:name");
}

#[test]
#[should_panic(expected = "route already registered")]
fn duplicate_routes_panic_at_registration() {
    let mut app = Router::new(MemoryEngine::new());
    app.get("/dup", echo_path);
    app.get("/dup", echo_path);
}

#[tokio::test]
async fn static_dir_serves_files_and_refuses_escapes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();

    let mut app = Router::new(MemoryEngine::new());
    app.group("/assets").static_dir("/", dir.path());
    let engine = app.into_engine();

    let res = engine.dispatch(get("/assets/css/site.css")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.header("content-type"), Some("text/css"));
    assert_eq!(res.text(), "body{}");

    let res = engine.dispatch(Request::new(Method::Head, "/assets/index.html")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.header("content-length"), Some("11"));
    assert!(res.body().is_empty());

    let res = engine.dispatch(get("/assets/missing.txt")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = engine.dispatch(get("/assets/../secret")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

async fn require_token(ctx: &mut Context, next: Next) -> Result {
    if ctx.header("authorization") != Some("Bearer let-me-in") {
        return Err(Error::http(StatusCode::UNAUTHORIZED, "missing token"));
    }
    next.run(ctx).await
}

#[tokio::test]
async fn guard_errors_become_responses() {
    let mut app = Router::new(MemoryEngine::new());
    app.middleware(from_fn(|ctx, next| Box::pin(require_token(ctx, next))));
    app.get("/secret", echo_path);
    let engine = app.into_engine();

    let res = engine.dispatch(get("/secret")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.text(), "missing token");

    let authed = get("/secret").with_header("authorization", "Bearer let-me-in");
    let res = engine.dispatch(authed).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text(), "/secret");
}

#[tokio::test]
async fn native_stages_wrap_routes_registered_after_them() {
    let log = Log::default();
    let stage_log = Arc::clone(&log);

    let mut engine = MemoryEngine::new();
    engine.use_native(handler_fn(move |ctx| {
        let log = Arc::clone(&stage_log);
        Box::pin(async move {
            log.lock().unwrap().push(format!("native {}", ctx.path()));
            ctx.next().await
        })
    }));

    let mut app = Router::new(engine);
    app.middleware(from_fn(|ctx, next| {
        Box::pin(async move {
            ctx.abort();
            ctx.text("aborted by core middleware");
            next.run(ctx).await
        })
    }));
    app.get("/wrapped", echo_path);
    let engine = app.into_engine();

    let res = engine.dispatch(get("/wrapped")).await;
    assert_eq!(res.text(), "aborted by core middleware");
    assert_eq!(*log.lock().unwrap(), ["native /wrapped"]);
}

type Log = Arc<Mutex<Vec<String>>>;

async fn native_gate(ctx: &mut Context, log: Log) -> Result {
    if ctx.header("x-native-block").is_some() {
        ctx.set_status(StatusCode::FORBIDDEN);
        ctx.abort();
    }
    let result = ctx.next().await;
    log.lock().unwrap().push(format!("native saw aborted={}", ctx.is_aborted()));
    result
}

async fn core_gate(ctx: &mut Context, next: Next, log: Log) -> Result {
    log.lock().unwrap().push("core".into());
    if ctx.header("x-core-block").is_some() {
        ctx.abort();
    }
    next.run(ctx).await
}

async fn logged_handler(ctx: &mut Context, log: Log) -> Result {
    log.lock().unwrap().push("handler".into());
    ctx.text("done");
    Ok(())
}

fn gated_engine(log: &Log) -> MemoryEngine {
    let mut engine = MemoryEngine::new();
    let native_log = Arc::clone(log);
    engine.use_native(handler_fn(move |ctx| Box::pin(native_gate(ctx, Arc::clone(&native_log)))));

    let mut app = Router::new(engine);
    let core_log = Arc::clone(log);
    app.middleware(from_fn(move |ctx, next| Box::pin(core_gate(ctx, next, Arc::clone(&core_log)))));
    let handler_log = Arc::clone(log);
    app.get("/gated", handler_fn(move |ctx| Box::pin(logged_handler(ctx, Arc::clone(&handler_log)))));
    app.into_engine()
}

#[tokio::test]
async fn abort_is_shared_between_native_stages_and_core() {
    let log = Log::default();
    let engine = gated_engine(&log);

    let res = engine.dispatch(get("/gated")).await;
    assert_eq!(res.text(), "done");
    assert_eq!(*log.lock().unwrap(), ["core", "handler", "native saw aborted=false"]);

    // Core abort is visible to the native stage once control comes back.
    log.lock().unwrap().clear();
    let res = engine.dispatch(get("/gated").with_header("x-core-block", "1")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.body().is_empty());
    assert_eq!(*log.lock().unwrap(), ["core", "native saw aborted=true"]);

    // Native abort stops the core chain and the handler.
    log.lock().unwrap().clear();
    let res = engine.dispatch(get("/gated").with_header("x-native-block", "1")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(*log.lock().unwrap(), ["native saw aborted=true"]);
}

async fn sequence(ctx: &mut Context) -> Result {
    let seq = ctx.native::<memory::Native>()?.sequence;
    ctx.text(seq.to_string());
    Ok(())
}

async fn peer_addr(ctx: &mut Context) -> Result {
    let addr = ctx.native::<radix::Native>()?.remote_addr;
    ctx.text(addr.to_string());
    Ok(())
}

#[tokio::test]
async fn native_handle_matches_the_running_engine() {
    let mut app = Router::new(MemoryEngine::new());
    app.get("/seq", handler_fn(|ctx| Box::pin(sequence(ctx))));
    app.get("/radix-only", handler_fn(|ctx| Box::pin(peer_addr(ctx))));
    let engine = app.into_engine();

    assert_eq!(engine.dispatch(get("/seq")).await.text(), "1");
    assert_eq!(engine.dispatch(get("/seq")).await.text(), "2");

    let res = engine.dispatch(get("/radix-only")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
