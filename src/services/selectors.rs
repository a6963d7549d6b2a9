//! 门户页面元素选择器
//!
//! 门户基于 Vaadin 组件搭建，选择器集中放在这里，
//! 服务层与集成测试共用同一套常量。

// ---------- 登录 ----------
pub const PAIS_SELECT: &str = "#pais";
pub const UNEG_SELECT: &str = "#uneg";
pub const LOGIN_ENTRY_BUTTON: &str = ".btn";
pub const USERNAME_INPUT: &str = "#username";
pub const PASSWORD_INPUT: &str = "#password";
pub const LOGIN_SUBMIT_BUTTON: &str = "#kc-login";

// ---------- 会话 ----------
/// 会话过期后门户显示的返回首页元素
pub const SESSION_EXPIRED_MARKER: &str = ".back-home";
pub const LOGOUT_BUTTON: &str = "#btn-logout";

// ---------- 菜单导航 ----------
pub const MENU_BUTTON: &str = ".btn-menu-header";
pub const MENU_REPORTS_ITEM: &str = ".bbr-menu-item:nth-child(4) > .bbr-menu-item__link";
pub const MENU_SALES_ITEM: &str = ".bbr-menu-item:nth-child(1) > .bbr-menu-item__link";
pub const MENU_INVENTORY_ITEM: &str = ".bbr-menu-item:nth-child(2) > .bbr-menu-item__link";

// ---------- 状态栅格（参考日期来源） ----------
pub const GRID_VENTAS_ROW: &str = "div.cell-text-align-left[title='Ventas']";
pub const GRID_FECHA_CELL: &str =
    "vaadin-grid-cell-content[slot='vaadin-grid-cell-content-5'] > div";
pub const GRID_ULTIMA_CARGA_CELL: &str =
    "vaadin-grid-cell-content[slot='vaadin-grid-cell-content-6'] > div";

// ---------- 报表控件 ----------
pub const UNIT_SELECT: &str = "vaadin-select.bbr-filter-fields.bbr-filter-select";
pub const DATE_START_PICKER: &str = "vaadin-date-picker.bbr-filter-fields:first-of-type";
pub const DATE_END_PICKER: &str = "vaadin-date-picker.bbr-filter-fields:nth-of-type(2)";
pub const FILTER_RESET_BUTTON: &str = "#btn-filter";
pub const GENERATE_BUTTON: &str = "vaadin-button.filter-button";
pub const DOWNLOAD_MENU_BUTTON: &str = "#btn-download";
/// 销售报表的"Descargar reporte"（zip 格式）菜单项
pub const SALES_EXPORT_OPTION: &str = ".vaadin-menu-item:nth-child(3) > .link-button";
pub const INVENTORY_EXPORT_OPTION: &str = ".vaadin-menu-item:nth-child(1) > .link-button";
pub const CSV_FORMAT_RADIO: &str = "vaadin-radio-button:nth-child(2) > label";
pub const EXPORT_APPLY_BUTTON: &str = ".filter-apply-button";
pub const SALES_CSV_LINK: &str = "a[href*='venta_']";
pub const INVENTORY_CSV_LINK: &str = "a[href*='detalleinventario_']";

/// 业务单元下拉项的选择器（按遍历下标）
pub fn unit_option(unit_index: usize) -> String {
    format!("vaadin-item:nth-child({})", unit_index + 1)
}
