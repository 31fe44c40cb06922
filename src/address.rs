//! ネットワークアドレス関連の構成要素.

/// アドレスのスコープ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressScope {
    /// 外部に公開されているアドレス.
    Public,

    /// クラウド(データセンタ)内部でのみ到達可能なアドレス.
    CloudLocal,

    /// マシン内部でのみ有効なアドレス.
    MachineLocal,

    /// スコープが判別できなかったアドレス.
    Unknown,
}

/// スコープ付きのネットワークアドレス.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// ホスト名ないしIPアドレスのリテラル.
    pub value: String,

    /// アドレスのスコープ.
    pub scope: AddressScope,
}
impl Address {
    /// 新しい`Address`インスタンスを生成する.
    pub fn new<T: Into<String>>(value: T, scope: AddressScope) -> Self {
        Address {
            value: value.into(),
            scope,
        }
    }
}

/// ピア間の通信に使用すべき内部アドレスを選択する.
///
/// スコープの優先順位は「クラウド内部 > マシン内部 > その他」となる.
/// 候補が一つも存在しない場合には`None`が返される.
pub fn select_internal_address(addresses: &[Address]) -> Option<&str> {
    scoped(addresses, AddressScope::CloudLocal)
        .or_else(|| scoped(addresses, AddressScope::MachineLocal))
        .or_else(|| addresses.first())
        .map(|a| a.value.as_str())
}

fn scoped(addresses: &[Address], scope: AddressScope) -> Option<&Address> {
    addresses.iter().find(|a| a.scope == scope)
}

/// ホストとポートを`host:port`形式の文字列に合成する.
///
/// IPv6のリテラルは`[...]`で括られる.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
