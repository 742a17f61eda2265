use crate::args::WatchTarget;
use crate::commands::{plural, Out};
use crate::sync::{SubscriptionHandle, ViewState};
use crate::{goals, ledger, tasks};
use crate::{AppContext, Error, Result};
use serde::Serialize;
use std::future::Future;
use tracing::{error, info};

/// Prints every snapshot of `target` as a JSON array on stdout until Ctrl-C.
pub async fn watch(ctx: &AppContext, target: WatchTarget) -> Result<Out<usize>> {
    watch_until(ctx, target, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {e}");
        }
    })
    .await
}

pub(crate) async fn watch_until<S>(
    ctx: &AppContext,
    target: WatchTarget,
    stop: S,
) -> Result<Out<usize>>
where
    S: Future<Output = ()>,
{
    info!("Watching {target}, press Ctrl-C to stop");
    let printed = match target {
        WatchTarget::Goals => follow(goals::watch_goals(ctx).await, stop).await?,
        WatchTarget::Ledger => follow(ledger::watch_entries(ctx, None).await, stop).await?,
        WatchTarget::Tasks => follow(tasks::watch_tasks(ctx, None).await, stop).await?,
    };
    Ok(Out::new(
        format!("Stopped watching {target} after {}", plural(printed, "snapshot", "snapshots")),
        printed,
    ))
}

async fn follow<T, S>(mut view: SubscriptionHandle<T>, stop: S) -> Result<usize>
where
    T: Serialize + Send + Sync + 'static,
    S: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut printed = 0;
    let mut state = view.state();
    loop {
        if let Some(e) = state.error.take() {
            view.close();
            return Err(Error::from(e));
        }
        if !state.loading {
            print_state(&state);
            printed += 1;
        }
        state = tokio::select! {
            next = view.next() => match next {
                Some(next) => next,
                None => break,
            },
            _ = &mut stop => break,
        };
    }
    view.close();
    Ok(printed)
}

fn print_state<T: Serialize>(state: &ViewState<T>) {
    match serde_json::to_string(state.records.as_slice()) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Unable to serialize the snapshot: {e}"),
    }
}
