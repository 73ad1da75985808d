use calmerge_core::configure::{ConfigureDialog, Field};
use chrono::NaiveDate;
use url::Url;
use wasm_bindgen::JsCast;
use web_sys::HtmlInputElement;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct ConfigureProps {
    pub dialog: ConfigureDialog,
    /// The current page, the base of the saved URL.
    pub page: Url,
    pub today: NaiveDate,
    pub on_change: Callback<ConfigureDialog>,
    pub on_cancel: Callback<()>,
}

fn input_value(e: &InputEvent) -> String {
    e.target()
        .map(|target| target.unchecked_into::<HtmlInputElement>().value())
        .unwrap_or_default()
}

/// Edits a copy of the configuration. Saving navigates to the new page URL.
#[function_component]
pub fn Configure(props: &ConfigureProps) -> Html {
    let edit = |f: Box<dyn Fn(&mut ConfigureDialog, String)>| {
        let dialog = props.dialog.clone();
        let on_change = props.on_change.clone();
        Callback::from(move |e: InputEvent| {
            let mut dialog = dialog.clone();
            f(&mut dialog, input_value(&e));
            on_change.emit(dialog);
        })
    };
    let on_month_offset = edit(Box::new(|dialog, value| dialog.set_month_offset(&value)));
    let on_add = {
        let dialog = props.dialog.clone();
        let on_change = props.on_change.clone();
        Callback::from(move |_: MouseEvent| {
            let mut dialog = dialog.clone();
            dialog.add_blank();
            on_change.emit(dialog);
        })
    };
    let on_cancel = {
        let on_cancel = props.on_cancel.clone();
        Callback::from(move |_: MouseEvent| on_cancel.emit(()))
    };
    let save_url = props.dialog.save_url(&props.page).to_string();

    let rows = props.dialog.sources().iter().enumerate().map(|(ix, source)| {
        let on_id = edit(Box::new(move |dialog, value| dialog.update(ix, Field::Id, value)));
        let on_url = edit(Box::new(move |dialog, value| dialog.update(ix, Field::Url, value)));
        let on_color = edit(Box::new(move |dialog, value| dialog.update(ix, Field::Color, value)));
        let on_remove = {
            let dialog = props.dialog.clone();
            let on_change = props.on_change.clone();
            Callback::from(move |_: MouseEvent| {
                let mut dialog = dialog.clone();
                dialog.remove(ix);
                on_change.emit(dialog);
            })
        };
        html! {
            <tr>
                <td><input oninput={on_id} placeholder="ID" value={source.id.clone()} /></td>
                <td><input oninput={on_url} placeholder="https://example.com/calendar.ics" value={source.url.clone()} /></td>
                <td><input oninput={on_color} placeholder="#rrggbb" value={source.color.clone()} /></td>
                <td><button onclick={on_remove}>{"Remove"}</button></td>
            </tr>
        }
    });

    html! {
        <dialog open=true>
            <h2>{"Configure"}</h2>
            <div>
                <label>{"Month offset"}<br/><input
                    oninput={on_month_offset}
                    type="number"
                    min="-12"
                    max="12"
                    value={props.dialog.month_offset().to_string()}
                /></label>
                <span>{" "}{props.dialog.visible_month(props.today)}</span>
            </div>
            <table>
                <thead>
                    <tr><th>{"ID"}</th><th>{"URL"}</th><th>{"Color"}</th><th></th></tr>
                </thead>
                <tbody>{ for rows }</tbody>
            </table>
            <div>
                <button onclick={on_add}>{"Add"}</button>
                <button onclick={on_cancel}>{"Cancel"}</button>
                <a href={save_url}>{"Save & Reload"}</a>
            </div>
        </dialog>
    }
}
