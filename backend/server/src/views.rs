//! Bare HTML pages. Anything user supplied goes through `escape_html`.
use axum::response::Html;

use crate::{images::Slot, utils::escape_html};

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    ))
}

fn credentials_form(action: &str, submit: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{action}\">\
         <input name=\"username\" placeholder=\"Username\" required>\
         <input name=\"password\" type=\"password\" placeholder=\"Password\" required>\
         <button type=\"submit\">{submit}</button></form>"
    )
}

pub fn login_page() -> Html<String> {
    let body = format!(
        "<h1>Login</h1>{}<p><a href=\"/register\">Register</a></p>",
        credentials_form("/login", "Login")
    );

    layout("Login", &body)
}

pub fn register_page() -> Html<String> {
    let body = format!(
        "<h1>Register</h1>{}<p><a href=\"/login\">Login</a></p>",
        credentials_form("/register", "Register")
    );

    layout("Register", &body)
}

pub fn start_page() -> Html<String> {
    layout(
        "Start",
        "<h1>Pick a nickname</h1>\
         <form method=\"post\" action=\"/start\">\
         <input name=\"nickname\" placeholder=\"Nickname\" required>\
         <button type=\"submit\">Start</button></form>",
    )
}

pub fn quiz_page(display_name: &str, grid: &[(Slot, String)]) -> Html<String> {
    let cells: String = grid
        .iter()
        .map(|(slot, url)| {
            format!(
                "<figure data-slot=\"{slot}\"><img src=\"{}\" alt=\"Image {slot}\" loading=\"lazy\"><figcaption>{slot}</figcaption></figure>\n",
                escape_html(url)
            )
        })
        .collect();

    let body = format!(
        "<h1>Quiz</h1><p>Welcome, {}</p>\
         <p><a href=\"/upload_override\">Upload an image</a> | <a href=\"/course\">Course</a></p>\
         <div class=\"grid\">\n{cells}</div>",
        escape_html(display_name)
    );

    layout("Quiz", &body)
}

pub fn upload_page(flash: Option<&str>) -> Html<String> {
    let flash = flash
        .map(|message| format!("<p class=\"flash\">{}</p>", escape_html(message)))
        .unwrap_or_default();

    let body = format!(
        "<h1>Upload override</h1>{flash}\
         <form method=\"post\" action=\"/upload_override\" enctype=\"multipart/form-data\">\
         <input name=\"image_number\" type=\"number\" min=\"0\" max=\"99\" required>\
         <input name=\"image\" type=\"file\" accept=\".png,.jpg,.jpeg,.gif\" required>\
         <button type=\"submit\">Upload</button></form>\
         <p><a href=\"/quiz\">Back to quiz</a></p>"
    );

    layout("Upload", &body)
}

pub fn course_page(display_name: &str) -> Html<String> {
    let body = format!(
        "<h1>Course</h1><p>Enrolled as {}</p><p><a href=\"/quiz\">Back to quiz</a></p>",
        escape_html(display_name)
    );

    layout("Course", &body)
}
