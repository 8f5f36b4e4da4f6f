//! Blocking request app - one slow endpoint on a single event loop
//!
//! A handful of cheap requests share the loop with one request whose
//! "render" step burns 250ms. The hook reports the blocking run, tagged and
//! attributed to the request that caused it, and every request's breakdown
//! is printed at the end.
//!
//! Run with: cargo run --example blocking-request

use loopscope::config::HookOptions;
use loopscope::context::RequestContext;
use loopscope::diagnostics::StderrSink;
use loopscope::domain::{Duration, RequestId, TaskKind};
use loopscope::hook::{install_with_sink, HookHandle};
use loopscope::sim::EventLoop;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn main() {
    let hook: HookHandle<Value> = install_with_sink(HookOptions::default(), StderrSink);
    hook.enable();

    let mut event_loop = EventLoop::new(Rc::new(hook.clone()));
    let contexts: Rc<RefCell<Vec<Rc<RequestContext<Value>>>>> = Rc::default();

    let requests = [
        (1, "/health", 2),
        (2, "/report", 250),
        (3, "/health", 2),
        (4, "/users", 15),
    ];
    for (id, path, render_ms) in requests {
        let hook = hook.clone();
        let contexts = Rc::clone(&contexts);
        event_loop.schedule(TaskKind::RequestRoot, Duration::from_millis(id * 5), move |cx| {
            let context = hook.create_request_context(cx, json!({ "path": path }));
            context.set_request_id(RequestId(id));
            contexts.borrow_mut().push(context);
            cx.burn(Duration::from_millis(1));

            cx.set_timeout(Duration::from_millis(3), move |cx| {
                hook.add_tag(cx, "render");
                cx.burn(Duration::from_millis(render_ms));
                cx.spawn(TaskKind::WriteCompletion, |cx| cx.burn(Duration::from_millis(1)));
            });
        });
    }
    event_loop.run();

    println!("\nPer-request CPU time:");
    for context in contexts.borrow().iter() {
        print!("{}", context.to_diagnostic_string());
    }
    println!("\nlive entries after shutdown: {}", hook.live_entries().total());
}
