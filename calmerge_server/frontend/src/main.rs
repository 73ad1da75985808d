use std::rc::Rc;

use calmerge_core::{
    adapter::{FeedRequest, Feeds},
    configure::ConfigureDialog,
    refresh::RefreshScheduler,
    view::{visible_range, ViewConfig},
    CalendarEvent,
};
use chrono::{Local, NaiveDate};
use gloo::timers::callback::{Interval, Timeout};
use url::Url;
use web_sys::window;
use yew::prelude::*;

use crate::{
    configure::Configure, fetch::fetch_events, month::MonthGrid, status::StatusBanner,
};

mod configure;
mod fetch;
mod month;
mod status;

/// The page as a parsed URL, if the browser hands one out.
fn page_url() -> Option<Url> {
    let href = window()?.location().href().ok()?;
    Url::parse(&href).ok()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, PartialEq)]
struct FeedState(Feeds);

enum FeedAction {
    Begin {
        generation: u64,
        count: usize,
    },
    Success {
        generation: u64,
        request: FeedRequest,
        events: Vec<CalendarEvent>,
    },
    Failure {
        generation: u64,
        request: FeedRequest,
        message: String,
    },
}

impl Reducible for FeedState {
    type Action = FeedAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut feeds = self.0.clone();
        let changed = match action {
            FeedAction::Begin { generation, count } => {
                feeds.begin_cycle(generation, count);
                true
            }
            FeedAction::Success {
                generation,
                request,
                events,
            } => feeds.on_success(generation, &request, events),
            FeedAction::Failure {
                generation,
                request,
                message,
            } => feeds.on_failure(generation, &request, &message),
        };
        if changed {
            Rc::new(FeedState(feeds))
        } else {
            self
        }
    }
}

/// What the polling timer needs from the latest render.
#[derive(Default)]
struct Latest {
    loading: bool,
    requests: Vec<FeedRequest>,
}

/// Start a refresh cycle: fetch every request concurrently and report each completion.
fn refresh(
    dispatcher: &UseReducerDispatcher<FeedState>,
    generation: u64,
    requests: Vec<FeedRequest>,
) {
    log::debug!("refresh cycle {} with {} sources", generation, requests.len());
    dispatcher.dispatch(FeedAction::Begin {
        generation,
        count: requests.len(),
    });
    for request in requests {
        let dispatcher = dispatcher.clone();
        yew::platform::spawn_local(async move {
            let action = match fetch_events(&request).await {
                Ok(events) => FeedAction::Success {
                    generation,
                    request,
                    events,
                },
                Err(message) => FeedAction::Failure {
                    generation,
                    request,
                    message,
                },
            };
            dispatcher.dispatch(action);
        });
    }
}

#[function_component]
pub fn App() -> Html {
    let page = use_memo(|_| page_url(), ());
    let config = use_memo(
        |page| match page.as_ref() {
            Some(page) => ViewConfig::from_url(page),
            None => ViewConfig {
                month_offset: 0,
                sources: vec![],
            },
        },
        (*page).clone(),
    );
    let month = config.initial_date(today());
    let range = visible_range(month);

    let feeds = {
        let config = config.clone();
        use_reducer(move || FeedState(Feeds::new(&config.sources)))
    };
    let generation = use_mut_ref(|| 0u64);
    let latest = use_mut_ref(Latest::default);
    *latest.borrow_mut() = Latest {
        loading: feeds.0.is_loading(),
        requests: feeds.0.requests(&range),
    };

    // Initial load.
    {
        let dispatcher = feeds.dispatcher();
        let generation = generation.clone();
        let latest = latest.clone();
        use_effect_with_deps(
            move |_| {
                *generation.borrow_mut() += 1;
                let requests = latest.borrow().requests.clone();
                refresh(&dispatcher, *generation.borrow(), requests);
                || ()
            },
            (),
        );
    }

    // Polling and the daily reload.
    {
        let dispatcher = feeds.dispatcher();
        let generation = generation.clone();
        let latest = latest.clone();
        use_effect_with_deps(
            move |_| {
                let scheduler = RefreshScheduler::default();
                let interval_ms = u32::try_from(scheduler.interval.as_millis()).unwrap_or(u32::MAX);
                let interval = Interval::new(interval_ms, move || {
                    let (loading, requests) = {
                        let latest = latest.borrow();
                        (latest.loading, latest.requests.clone())
                    };
                    if scheduler.should_refetch(loading) {
                        *generation.borrow_mut() += 1;
                        refresh(&dispatcher, *generation.borrow(), requests);
                    }
                });
                let delay = scheduler.delay_until_reload(&Local::now());
                let reload_ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
                log::info!("reloading in {} s", delay.as_secs());
                let reload = Timeout::new(reload_ms, || {
                    if let Some(window) = window() {
                        if let Err(err) = window.location().reload() {
                            log::error!("reload failed: {:?}", err);
                        }
                    }
                });
                move || {
                    drop(interval);
                    drop(reload);
                }
            },
            (),
        );
    }

    let dialog_handle = use_state(|| None::<ConfigureDialog>);
    let on_open = {
        let dialog_handle = dialog_handle.clone();
        let config = config.clone();
        Callback::from(move |_: MouseEvent| {
            dialog_handle.set(Some(ConfigureDialog::from(&*config)))
        })
    };
    let on_change = {
        let dialog_handle = dialog_handle.clone();
        Callback::from(move |dialog: ConfigureDialog| dialog_handle.set(Some(dialog)))
    };
    let on_cancel = {
        let dialog_handle = dialog_handle.clone();
        Callback::from(move |_: ()| dialog_handle.set(None))
    };

    let configure = match (&*dialog_handle, (*page).as_ref()) {
        (Some(dialog), Some(page)) => html! {
            <Configure
                dialog={dialog.clone()}
                page={page.clone()}
                today={today()}
                {on_change}
                {on_cancel}
            />
        },
        _ => html! {},
    };

    html! {
        <main>
            <header>
                <h1>{month.format("%B %Y").to_string()}</h1>
                <StatusBanner status={feeds.0.status()} />
                <button onclick={on_open}>{"Configure"}</button>
            </header>
            <MonthGrid {month} {range} events={Rc::new(feeds.0.merged())} />
            {configure}
        </main>
    }
}

fn main() {
    #[cfg(target_arch = "wasm32")]
    wasm_logger::init(wasm_logger::Config::default());
    yew::Renderer::<App>::new().render();
}
