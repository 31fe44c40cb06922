//! コントローラ側から見たマシン関連の構成要素.
use crate::address::Address;

/// マシンのID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(String);
impl MachineId {
    /// 新しい`MachineId`インスタンスを生成する.
    pub fn new<T: Into<String>>(id: T) -> Self {
        MachineId(id.into())
    }

    /// IDに対応する文字列を返す.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// IDの所有権を放棄して、対応する文字列を返す.
    pub fn into_string(self) -> String {
        self.0
    }
}
impl From<String> for MachineId {
    fn from(f: String) -> Self {
        MachineId::new(f)
    }
}
impl<'a> From<&'a str> for MachineId {
    fn from(f: &'a str) -> Self {
        MachineId::new(f)
    }
}
impl From<MachineId> for String {
    fn from(f: MachineId) -> Self {
        f.into_string()
    }
}

/// コントローラが管理するマシンの各種情報を保持するためのデータ構造.
#[derive(Debug, Clone)]
pub struct Machine {
    /// マシンのID.
    pub id: MachineId,

    /// コントローラが、このマシンをレプリカセットに
    /// 参加させたいと考えているかどうか.
    pub candidate: bool,

    /// マシンに割り当てられたアドレス群.
    ///
    /// 内部アドレスを一つ選択するためだけに使用される.
    pub addresses: Vec<Address>,

    /// 調停後のマシンの投票状態.
    ///
    /// `desired::desired_peer_group`関数によって設定される.
    pub voting: bool,
}
impl Machine {
    /// 新しい`Machine`インスタンスを生成する.
    pub fn new(id: MachineId, candidate: bool, addresses: Vec<Address>) -> Self {
        Machine {
            id,
            candidate,
            addresses,
            voting: false,
        }
    }
}
