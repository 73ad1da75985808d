use std::rc::Rc;

use calmerge_core::{adapter::MergedEvent, view::DateRange};
use chrono::{Datelike, NaiveDate};
use yew::prelude::*;

static WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Properties, PartialEq)]
pub struct MonthGridProps {
    /// Any day of the displayed month.
    pub month: NaiveDate,
    pub range: DateRange,
    pub events: Rc<Vec<MergedEvent>>,
}

#[function_component]
pub fn MonthGrid(props: &MonthGridProps) -> Html {
    let weeks = props.range.weeks();
    html! {
        <table class="month">
            <thead>
                <tr>{ for WEEKDAYS.iter().map(|day| html! { <th>{*day}</th> }) }</tr>
            </thead>
            <tbody>
                { for weeks.iter().map(|week| html! {
                    <tr>
                        { for week.iter().map(|day| day_cell(props, *day)) }
                    </tr>
                }) }
            </tbody>
        </table>
    }
}

fn day_cell(props: &MonthGridProps, day: NaiveDate) -> Html {
    let class = if day.month() == props.month.month() {
        "day"
    } else {
        "day other-month"
    };
    html! {
        <td {class}>
            <div class="day-number">{day.day().to_string()}</div>
            { for props
                .events
                .iter()
                .filter(|merged| merged.event.occurs_on(day))
                .map(event_chip) }
        </td>
    }
}

fn event_chip(merged: &MergedEvent) -> Html {
    let event = &merged.event;
    let style = format!("background-color: {}", merged.color);
    let title = event.location.clone().unwrap_or_default();
    html! {
        <div class="event" {style} {title}>
            <span class="source">{merged.source_id.clone()}</span>
            if let Some(time) = event.time_text() {
                <span class="time">{time}</span>
            }
            <span class="title">{event.title.clone()}</span>
        </div>
    }
}
