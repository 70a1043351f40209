pub mod remittance;
pub mod sync;
pub mod tier;

pub use remittance::api_post as remittance_api_post;
pub use remittance::get as remittance_get;
pub use remittance::post as remittance_post;
pub use sync::post as sync_post;
pub use tier::delete as tier_delete;
pub use tier::delete_form as tier_delete_form;

use axum::response::Redirect;

pub const REMITTANCE_PAGE: &str = "/commission/remittance";

/// Redirect back to the remittance page, carrying `errmsg` when set
pub fn redirect_to_page(errmsg: Option<&str>) -> Redirect {
    match errmsg {
        Some(msg) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("errmsg", msg)
                .finish();
            Redirect::to(&format!("{}?{}", REMITTANCE_PAGE, query))
        }
        None => Redirect::to(REMITTANCE_PAGE),
    }
}
