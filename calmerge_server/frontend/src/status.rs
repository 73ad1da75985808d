use calmerge_core::status::Status;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct StatusBannerProps {
    pub status: Status,
}

/// A single error is shown inline, several as a list.
#[function_component]
pub fn StatusBanner(props: &StatusBannerProps) -> Html {
    match &props.status {
        Status::Errors(messages) if messages.len() > 1 => html! {
            <div class="status error">
                <ul>
                    { for messages.iter().map(|message| html! { <li>{message.clone()}</li> }) }
                </ul>
            </div>
        },
        status if status.is_error() => html! {
            <div class="status error">{status.to_string()}</div>
        },
        status => html! {
            <div class="status">{status.to_string()}</div>
        },
    }
}
